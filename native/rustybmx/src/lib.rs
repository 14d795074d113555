//! RustyBMX - Binary Micro XML encoding for micro-DOM trees
//!
//! Layers:
//! - dom: arena-based micro-DOM (the tree being serialized)
//! - bmx: the BMX stream format, writer and reader
//! - parallel: batch encode/decode across documents (rayon)
//! - NIFs: `RustyBMX.Native`, converting trees to and from Elixir terms

use rustler::{Binary, Encoder, Env, NifResult, Term};

pub mod bmx;
pub mod dom;
pub mod parallel;
mod term;

use term::{bytes_to_binary, error_tuple, ok_tuple, term_to_tree, tree_to_term};

// ============================================================================
// Allocator Configuration
// ============================================================================

#[cfg(feature = "memory_tracking")]
mod tracking {
    use std::alloc::{GlobalAlloc, Layout};
    use std::sync::atomic::{AtomicUsize, Ordering};

    pub static ALLOCATED: AtomicUsize = AtomicUsize::new(0);
    pub static PEAK_ALLOCATED: AtomicUsize = AtomicUsize::new(0);

    /// Counts live bytes on top of the configured allocator
    pub struct TrackingAllocator;

    #[cfg(feature = "mimalloc")]
    static UNDERLYING: mimalloc::MiMalloc = mimalloc::MiMalloc;

    #[cfg(not(feature = "mimalloc"))]
    static UNDERLYING: std::alloc::System = std::alloc::System;

    fn record_peak(current: usize) {
        let mut peak = PEAK_ALLOCATED.load(Ordering::Relaxed);
        while current > peak {
            match PEAK_ALLOCATED.compare_exchange_weak(
                peak,
                current,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(p) => peak = p,
            }
        }
    }

    unsafe impl GlobalAlloc for TrackingAllocator {
        unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
            let ptr = UNDERLYING.alloc(layout);
            if !ptr.is_null() {
                record_peak(ALLOCATED.fetch_add(layout.size(), Ordering::Relaxed) + layout.size());
            }
            ptr
        }

        unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
            ALLOCATED.fetch_sub(layout.size(), Ordering::Relaxed);
            UNDERLYING.dealloc(ptr, layout)
        }
    }
}

#[cfg(feature = "memory_tracking")]
#[global_allocator]
static GLOBAL: tracking::TrackingAllocator = tracking::TrackingAllocator;

#[cfg(all(feature = "mimalloc", not(feature = "memory_tracking")))]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

// ============================================================================
// Memory Tracking NIFs
// ============================================================================

#[cfg(feature = "memory_tracking")]
use std::sync::atomic::Ordering;

#[cfg(feature = "memory_tracking")]
#[rustler::nif]
fn get_rust_memory() -> usize {
    tracking::ALLOCATED.load(Ordering::SeqCst)
}

#[cfg(feature = "memory_tracking")]
#[rustler::nif]
fn get_rust_memory_peak() -> usize {
    tracking::PEAK_ALLOCATED.load(Ordering::SeqCst)
}

#[cfg(feature = "memory_tracking")]
#[rustler::nif]
fn reset_rust_memory_stats() -> (usize, usize) {
    let current = tracking::ALLOCATED.load(Ordering::SeqCst);
    let peak = tracking::PEAK_ALLOCATED.swap(current, Ordering::SeqCst);
    (current, peak)
}

#[cfg(not(feature = "memory_tracking"))]
#[rustler::nif]
fn get_rust_memory() -> usize {
    0
}

#[cfg(not(feature = "memory_tracking"))]
#[rustler::nif]
fn get_rust_memory_peak() -> usize {
    0
}

#[cfg(not(feature = "memory_tracking"))]
#[rustler::nif]
fn reset_rust_memory_stats() -> (usize, usize) {
    (0, 0)
}

// ============================================================================
// Encode / Decode
// ============================================================================

/// Encode a node term as BMX (returns {:ok, binary} or {:error, reason})
/// Unknown settings bits give {:error, reason}
/// Raises ArgumentError if the term is not a node
#[rustler::nif]
fn bmx_encode<'a>(env: Env<'a>, tree: Term<'a>, settings: u32) -> NifResult<Term<'a>> {
    let tree = term_to_tree(tree)?;

    Ok(match bmx::encode_with_storage_value(&tree, settings) {
        Ok(bytes) => ok_tuple(env, bytes_to_binary(env, &bytes)),
        Err(e) => error_tuple(env, &e),
    })
}

/// Decode a BMX binary (returns {:ok, node | nil} or {:error, reason})
#[rustler::nif]
fn bmx_decode<'a>(env: Env<'a>, input: Binary<'a>) -> NifResult<Term<'a>> {
    Ok(match bmx::decode(input.as_slice()) {
        Ok(Some(tree)) => ok_tuple(env, tree_to_term(env, &tree)),
        Ok(None) => ok_tuple(env, rustler::types::atom::nil().encode(env)),
        Err(e) => error_tuple(env, &e),
    })
}

// ============================================================================
// Batch Encode / Decode (parallel)
// ============================================================================

/// Encode many node terms in parallel
/// Returns a list of {:ok, binary} | {:error, reason}, in input order
/// Unknown settings bits give {:error, reason} for every tree
#[rustler::nif(schedule = "DirtyCpu")]
fn bmx_encode_batch<'a>(env: Env<'a>, trees: Vec<Term<'a>>, settings: u32) -> NifResult<Term<'a>> {
    // Terms are bound to the env, so conversion happens before going parallel
    let trees = trees
        .into_iter()
        .map(term_to_tree)
        .collect::<NifResult<Vec<_>>>()?;
    let results = parallel::encode_batch_with_storage_value(&trees, settings);

    let mut list = Term::list_new_empty(env);
    for result in results.into_iter().rev() {
        let term = match result {
            Ok(bytes) => ok_tuple(env, bytes_to_binary(env, &bytes)),
            Err(e) => error_tuple(env, &e),
        };
        list = list.list_prepend(term);
    }
    Ok(list)
}

/// Decode many BMX binaries in parallel
/// Returns a list of {:ok, node | nil} | {:error, reason}, in input order
#[rustler::nif(schedule = "DirtyCpu")]
fn bmx_decode_batch<'a>(env: Env<'a>, inputs: Vec<Binary<'a>>) -> NifResult<Term<'a>> {
    let slices: Vec<&[u8]> = inputs.iter().map(|b| b.as_slice()).collect();
    let results = parallel::decode_batch(&slices);

    let mut list = Term::list_new_empty(env);
    for result in results.into_iter().rev() {
        let term = match result {
            Ok(Some(tree)) => ok_tuple(env, tree_to_term(env, &tree)),
            Ok(None) => ok_tuple(env, rustler::types::atom::nil().encode(env)),
            Err(e) => error_tuple(env, &e),
        };
        list = list.list_prepend(term);
    }
    Ok(list)
}

// ============================================================================
// NIF Initialization
// ============================================================================

rustler::init!("Elixir.RustyBMX.Native");
