use tinytrace::prelude::*;

/// Returns the index of `x` in the sorted `arr[left..=right]`, or -1.
#[program(description = "Iterative binary search over a sorted list")]
pub fn binary_search(frame: &mut Frame<'_>, arr: Vec<i64>, mut left: i64, mut right: i64, x: i64) -> i64 {
    observe!(frame; arr, left, right, x);
    while left <= right {
        let mid = left + (right - left) / 2;
        observe!(frame; mid);
        if arr[mid as usize] == x {
            return mid;
        } else if arr[mid as usize] < x {
            left = mid + 1;
            observe!(frame; left);
        } else {
            right = mid - 1;
            observe!(frame; right);
        }
    }
    -1
}
