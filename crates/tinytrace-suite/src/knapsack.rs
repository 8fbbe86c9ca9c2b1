use tinytrace::prelude::*;

/// Best total value fitting in capacity `w` using the first `n` items.
///
/// Recursive calls report through the caller's frame, so the callee's `w`
/// and `n` show up as changes to the same variables.
#[program(description = "Recursive 0/1 knapsack")]
pub fn knapsack(frame: &mut Frame<'_>, w: i64, wt: Vec<i64>, val: Vec<i64>, n: usize) -> i64 {
    observe!(frame; w, wt, val, n);
    if n == 0 || w == 0 {
        return 0;
    }

    if wt[n - 1] > w {
        let skipped = knapsack(frame, w, wt, val, n - 1);
        observe!(frame; w, n, skipped);
        return skipped;
    }

    let taken = val[n - 1] + knapsack(frame, w - wt[n - 1], wt.clone(), val.clone(), n - 1);
    observe!(frame; w, n, taken);
    let skipped = knapsack(frame, w, wt, val, n - 1);
    observe!(frame; w, n, skipped);
    taken.max(skipped)
}
