//! Starway batch loader behind a C ABI.
//!
//! `init` is one-shot; `next_batch` yields pointers that stay valid until
//! the next call for the same worker slot (the backing memory is never
//! freed). Every `num_threads`-th call launches one thread per worker,
//! worker `t` filling its batch from offset index
//! `(total_batches_yielded + t) mod num_offsets`, then joins them all.

pub mod batch;
pub mod moves_map;
pub mod worker;

use std::{
    ffi::{c_char, CStr},
    path::Path,
    sync::Mutex,
};

use batch::Batch;
use worker::Worker;

struct Loader {
    offsets: Vec<u64>,
    workers: Vec<Worker>,
    total_batches_yielded: u64,
}

static LOADER: Mutex<Option<Loader>> = Mutex::new(None);

/// Set up workers and read the offsets sidecar. Called once, before any
/// `next_batch`.
pub fn loader_init(data_path: &Path, offsets_path: &Path, batch_size: usize, num_threads: usize) {
    assert!(batch_size > 0);
    assert!(num_threads > 0);

    let offsets = match read_offsets(offsets_path) {
        Ok(offsets) => offsets,
        Err(message) => {
            eprintln!("Error reading batch offsets from {offsets_path:#?}: {message}");
            std::process::exit(1);
        }
    };

    println!("Batches in data file: {}", offsets.len());

    let workers = (0..num_threads)
        .map(|_| match Worker::new(data_path, batch_size) {
            Ok(worker) => worker,
            Err(err) => {
                eprintln!("Error opening data file {data_path:#?}: {err}");
                std::process::exit(1);
            }
        })
        .collect();

    let mut loader = LOADER.lock().expect("loader lock");
    assert!(loader.is_none(), "init called twice");

    *loader = Some(Loader { offsets, workers, total_batches_yielded: 0 });
}

pub fn loader_next_batch() -> *mut Batch {
    let mut guard = LOADER.lock().expect("loader lock");
    let loader = guard.as_mut().expect("init has been called");

    let num_workers = loader.workers.len() as u64;

    if loader.total_batches_yielded % num_workers == 0 {
        let total = loader.total_batches_yielded;
        let num_offsets = loader.offsets.len() as u64;
        let offsets = &loader.offsets;

        std::thread::scope(|scope| {
            for (t, worker) in loader.workers.iter_mut().enumerate() {
                let offset = offsets[((total + t as u64) % num_offsets) as usize];
                scope.spawn(move || worker.load(offset));
            }
        });
    }

    let slot = (loader.total_batches_yielded % num_workers) as usize;
    loader.total_batches_yielded += 1;

    loader.workers[slot].c_batch_ptr()
}

fn read_offsets(path: &Path) -> Result<Vec<u64>, String> {
    let bytes = std::fs::read(path).map_err(|err| err.to_string())?;

    if bytes.len() % 8 != 0 {
        return Err(format!("size {} is not a multiple of 8", bytes.len()));
    }

    if bytes.is_empty() {
        return Err("no batch offsets".into());
    }

    Ok(bytes.chunks_exact(8).map(|raw| u64::from_le_bytes(raw.try_into().unwrap())).collect())
}

/// # Safety
/// Both paths must be NUL-terminated strings; called once, from one thread.
#[no_mangle]
pub unsafe extern "C" fn init(
    data_path: *const c_char,
    offsets_path: *const c_char,
    batch_size: usize,
    num_threads: usize,
) {
    let data_path = unsafe { CStr::from_ptr(data_path) }.to_str().expect("utf-8 data path");
    let offsets_path =
        unsafe { CStr::from_ptr(offsets_path) }.to_str().expect("utf-8 offsets path");

    loader_init(Path::new(data_path), Path::new(offsets_path), batch_size, num_threads);
}

/// The returned batch is valid to read until this worker slot is refilled,
/// `num_threads` calls later.
#[no_mangle]
pub extern "C" fn next_batch() -> *mut Batch {
    loader_next_batch()
}
