//! Trainer-facing batch storage. The C-layout [`Batch`] only carries raw
//! pointers; the backing buffers live in [`BatchBuffer`] and are allocated
//! once at init, so every pointer stays valid for the process lifetime.

pub const MAX_PIECES_PER_POS: usize = 32;
pub const MAX_MOVES_PER_POS: usize = 64;

/// Mirrored by a ctypes.Structure on the trainer side. Array lengths are
/// implied by the batch size passed to `init`.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct Batch {
    pub active_features_stm: *mut i16,
    pub active_features_ntm: *mut i16,
    pub stm_scores: *mut i16,
    pub stm_results: *mut f32,
    pub legal_moves_idxs: *mut i16,
    pub best_move_idx: *mut u8,
}

pub struct BatchBuffer {
    pub active_features_stm: Vec<i16>,
    pub active_features_ntm: Vec<i16>,
    pub stm_scores: Vec<i16>,
    pub stm_results: Vec<f32>,
    pub legal_moves_idxs: Vec<i16>,
    pub best_move_idx: Vec<u8>,
    c_batch: Option<Batch>,
}

impl BatchBuffer {
    pub fn new(batch_size: usize) -> Self {
        Self {
            active_features_stm: vec![-1; batch_size * MAX_PIECES_PER_POS],
            active_features_ntm: vec![-1; batch_size * MAX_PIECES_PER_POS],
            stm_scores: vec![0; batch_size],
            stm_results: vec![0.0; batch_size],
            legal_moves_idxs: vec![-1; batch_size * MAX_MOVES_PER_POS],
            best_move_idx: vec![0; batch_size],
            c_batch: None,
        }
    }

    /// The pointers alias the owned vectors, which are never resized, so
    /// they stay valid until the process exits.
    pub fn c_batch_ptr(&mut self) -> *mut Batch {
        self.c_batch = Some(Batch {
            active_features_stm: self.active_features_stm.as_mut_ptr(),
            active_features_ntm: self.active_features_ntm.as_mut_ptr(),
            stm_scores: self.stm_scores.as_mut_ptr(),
            stm_results: self.stm_results.as_mut_ptr(),
            legal_moves_idxs: self.legal_moves_idxs.as_mut_ptr(),
            best_move_idx: self.best_move_idx.as_mut_ptr(),
        });

        self.c_batch.as_mut().expect("just set") as *mut Batch
    }
}

// The raw pointers in `c_batch` alias the owned vectors above; moving the
// buffer between threads is fine, sharing it is not.
unsafe impl Send for BatchBuffer {}
