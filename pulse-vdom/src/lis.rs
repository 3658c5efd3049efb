//! Longest increasing subsequence

/// Returns the indices of a longest strictly increasing subsequence of
/// `values`, in ascending order.
///
/// Zeros are skipped: they mark positions with no previous counterpart, which
/// can never be part of the subsequence.
#[must_use]
pub fn longest_increasing_subsequence(values: &[usize]) -> Vec<usize> {
	// Index of the smallest last value of any subsequence of length `idx + 1`
	let mut tails = Vec::<usize>::new();
	let mut prev = vec![None; values.len()];

	for (idx, &value) in values.iter().enumerate() {
		if value == 0 {
			continue;
		}

		let len = tails.partition_point(|&tail| values[tail] < value);
		if let Some(&before) = len.checked_sub(1).and_then(|before| tails.get(before)) {
			prev[idx] = Some(before);
		}
		match tails.get_mut(len) {
			Some(tail) => *tail = idx,
			None => tails.push(idx),
		}
	}

	let mut seq = Vec::with_capacity(tails.len());
	let mut cur = tails.last().copied();
	while let Some(idx) = cur {
		seq.push(idx);
		cur = prev[idx];
	}
	seq.reverse();

	seq
}
