use crate::models::NameCluster;

/// Longest member by character count; ties go to the earliest member.
pub fn select_representative(cluster: &NameCluster) -> &str {
    let mut best = cluster.seed().raw.as_str();
    let mut best_len = best.chars().count();
    for m in &cluster.members()[1..] {
        let len = m.raw.chars().count();
        if len > best_len {
            best = m.raw.as_str();
            best_len = len;
        }
    }
    best
}

/// One representative per cluster, in cluster order.
pub fn select_representatives(clusters: &[NameCluster]) -> Vec<String> {
    clusters
        .iter()
        .map(|c| select_representative(c).to_string())
        .collect()
}
