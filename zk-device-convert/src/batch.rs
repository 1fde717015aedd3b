//! Parallel batch conversion
//!
//! A batch of `n` elements converted with `w` workers is split into `w` contiguous chunks of
//! `n / w` elements, the last chunk absorbing the remainder. Every chunk is converted by its own
//! rayon task which writes only to its own result slot; once every task has finished the slots
//! are concatenated in chunk order. The output is therefore identical to a sequential
//! conversion, whatever the completion order of the workers.
//!
//! With `w <= 1` or `w > n` the conversion runs sequentially on the calling thread.

use std::convert::Infallible;
use std::ops::Range;

/// Whether a batch of `len` elements is converted on the calling thread
#[inline]
pub fn is_sequential(len: usize, workers: usize) -> bool {
    workers <= 1 || workers > len
}

/// Chunk assignment of a batch of `len` elements over `workers` workers.
///
/// A sequential batch is a single chunk covering the whole input.
pub fn chunk_ranges(len: usize, workers: usize) -> Vec<Range<usize>> {
    if is_sequential(len, workers) {
        return vec![0..len];
    }

    let batch_len = len / workers;
    (0..workers)
        .map(|i| {
            let start = batch_len * i;
            let end = if i == workers - 1 {
                len
            } else {
                batch_len * (i + 1)
            };
            start..end
        })
        .collect()
}

/// Converts `elements` chunk by chunk, the chunks being processed in parallel.
///
/// `convert` receives each chunk of [`chunk_ranges`] and must return exactly one output per
/// input. If any chunk fails, the error of the lowest indexed failing chunk is returned once
/// every worker has finished, and no partial output is produced.
#[tracing::instrument(level = "trace", skip_all, fields(len = elements.len(), workers = workers))]
pub fn convert_chunks<T, U, E, F>(elements: &[T], workers: usize, convert: F) -> Result<Vec<U>, E>
where
    T: Sync,
    U: Send,
    E: Send,
    F: Fn(&[T]) -> Result<Vec<U>, E> + Sync,
{
    if is_sequential(elements.len(), workers) {
        tracing::trace!("sequential conversion");
        return convert(elements);
    }

    let ranges = chunk_ranges(elements.len(), workers);
    tracing::debug!(chunks = ranges.len(), "parallel conversion");

    let mut slots: Vec<Result<Vec<U>, E>> = ranges.iter().map(|_| Ok(Vec::new())).collect();

    rayon::scope(|s| {
        for (slot, range) in slots.iter_mut().zip(ranges.iter()) {
            let chunk = &elements[range.clone()];
            let convert = &convert;
            s.spawn(move |_| {
                *slot = convert(chunk);
            });
        }
    });

    let mut result = Vec::with_capacity(elements.len());
    for (index, slot) in slots.into_iter().enumerate() {
        match slot {
            Ok(part) => result.extend(part),
            Err(err) => {
                tracing::debug!(chunk = index, "chunk conversion failed, discarding batch");
                return Err(err);
            }
        }
    }
    Ok(result)
}

/// Applies a fallible per-element conversion over a batch, preserving input order.
///
/// A worker stops at its first failing element.
pub fn convert_batch<T, U, E, F>(elements: &[T], workers: usize, convert: F) -> Result<Vec<U>, E>
where
    T: Sync,
    U: Send,
    E: Send,
    F: Fn(&T) -> Result<U, E> + Sync,
{
    convert_chunks(elements, workers, |chunk| chunk.iter().map(&convert).collect())
}

/// Infallible version of [`convert_batch`]
pub fn map_batch<T, U, F>(elements: &[T], workers: usize, convert: F) -> Vec<U>
where
    T: Sync,
    U: Send,
    F: Fn(&T) -> U + Sync,
{
    match convert_batch(elements, workers, |e| Ok::<_, Infallible>(convert(e))) {
        Ok(result) => result,
        Err(never) => match never {},
    }
}

/// Infallible version of [`convert_chunks`]
pub fn map_chunks<T, U, F>(elements: &[T], workers: usize, convert: F) -> Vec<U>
where
    T: Sync,
    U: Send,
    F: Fn(&[T]) -> Vec<U> + Sync,
{
    match convert_chunks(elements, workers, |chunk| Ok::<_, Infallible>(convert(chunk))) {
        Ok(result) => result,
        Err(never) => match never {},
    }
}
