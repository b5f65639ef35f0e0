//! Per-query fan-out over the rayon pool.
//!
//! Each item is processed independently against read-only shared state. A
//! panic inside one item is caught and reported as that item's
//! [`MatchError::WorkerFailure`]; the rest of the batch is unaffected. Results
//! come back in input order.

use crate::error::MatchError;
use log::warn;
use rayon::prelude::*;
use std::panic::{AssertUnwindSafe, catch_unwind};

pub fn fan_out<T, R, F>(items: &[T], f: F) -> Vec<Result<R, MatchError>>
where
    T: Sync,
    R: Send,
    F: Fn(&T) -> R + Sync,
{
    items
        .par_iter()
        .enumerate()
        .map(|(index, item)| {
            catch_unwind(AssertUnwindSafe(|| f(item))).map_err(|payload| {
                let reason = panic_message(payload.as_ref());
                warn!("worker failed on item {}: {}", index, reason);
                MatchError::WorkerFailure { index, reason }
            })
        })
        .collect()
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preserves_input_order() {
        let items: Vec<usize> = (0..1000).collect();
        let out = fan_out(&items, |i| i * 2);
        let values: Vec<usize> = out.into_iter().map(|r| r.unwrap()).collect();
        assert_eq!(values, items.iter().map(|i| i * 2).collect::<Vec<_>>());
    }

    #[test]
    fn a_panicking_item_does_not_abort_the_batch() {
        let items = vec!["ok", "boom", "ok"];
        let out = fan_out(&items, |s| {
            if *s == "boom" {
                panic!("bad record");
            }
            s.len()
        });
        assert_eq!(out[0], Ok(2));
        assert_eq!(
            out[1],
            Err(MatchError::WorkerFailure {
                index: 1,
                reason: "bad record".to_string()
            })
        );
        assert_eq!(out[2], Ok(2));
    }
}
