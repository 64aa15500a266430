//! Per-worker batch filling. Each worker owns one file handle, one scratch
//! read buffer and one batch's worth of output arrays; workers never share
//! state, so a barrier of plain threads is all the synchronisation needed.

use std::{
    fs::File,
    io::{Read, Seek, SeekFrom},
    path::Path,
};

use starway_chess::bitboard::{file_of, square, Color};
use starway_chess::movegen::legal_moves;
use starway_chess::{Move, Position};
use starway_format::entry::Mask;
use starway_format::{DataEntry, ENTRY_SIZE};

use crate::batch::{BatchBuffer, MAX_MOVES_PER_POS, MAX_PIECES_PER_POS};
use crate::moves_map::move_index;

pub struct Worker {
    file: File,
    raw: Vec<u8>,
    batch: BatchBuffer,
}

impl Worker {
    pub fn new(data_path: &Path, batch_size: usize) -> std::io::Result<Self> {
        Ok(Self {
            file: File::open(data_path)?,
            raw: vec![0; batch_size * ENTRY_SIZE],
            batch: BatchBuffer::new(batch_size),
        })
    }

    pub fn c_batch_ptr(&mut self) -> *mut crate::batch::Batch {
        self.batch.c_batch_ptr()
    }

    /// Decode one batch of records starting at `offset` into the batch
    /// arrays.
    pub fn load(&mut self, offset: u64) {
        self.file.seek(SeekFrom::Start(offset)).expect("seek to batch offset");
        self.file.read_exact(&mut self.raw).expect("read batch from data file");

        let batch_size = self.raw.len() / ENTRY_SIZE;

        for entry_idx in 0..batch_size {
            let raw: &[u8; ENTRY_SIZE] =
                self.raw[entry_idx * ENTRY_SIZE..][..ENTRY_SIZE].try_into().expect("exact slice");

            let entry = DataEntry::from_bytes(raw);
            entry.validate();

            decode_entry(&entry, entry_idx, &mut self.batch);
        }
    }
}

/// Mirror across the vertical axis when that side's king is on files a-d.
fn mirror_v_axis(king_sq: u8) -> bool {
    file_of(king_sq) < 4
}

fn decode_entry(entry: &DataEntry, entry_idx: usize, batch: &mut BatchBuffer) {
    let in_check = entry.get(Mask::InCheck) as i16;
    let our_king_sq = entry.get(Mask::OurKingSq) as u8;
    let their_king_sq = entry.get(Mask::TheirKingSq) as u8;

    // Ranks were already flipped at encode time; each perspective
    // additionally mirrors files by its own king. The ntm xor folds in the
    // rank flip back into that side's native orientation.
    let stm_xor = if mirror_v_axis(our_king_sq) { 7 } else { 0 };
    let ntm_xor = if mirror_v_axis(their_king_sq) { 56 ^ 7 } else { 56 };

    let mut pos = Position::default();
    let mut pieces_seen = 0;

    for (sq, color, piece) in entry.pieces_iter() {
        let idx = entry_idx * MAX_PIECES_PER_POS + pieces_seen;

        batch.active_features_stm[idx] = in_check * 768
            + color.idx() as i16 * 384
            + piece.idx() as i16 * 64
            + i16::from(sq ^ stm_xor);

        batch.active_features_ntm[idx] = in_check * 768
            + (!color).idx() as i16 * 384
            + piece.idx() as i16 * 64
            + i16::from(sq ^ ntm_xor);

        pos.toggle(color, piece, sq);
        pieces_seen += 1;
    }

    for pad in pieces_seen..MAX_PIECES_PER_POS {
        let idx = entry_idx * MAX_PIECES_PER_POS + pad;
        batch.active_features_stm[idx] = -1;
        batch.active_features_ntm[idx] = -1;
    }

    if entry.get(Mask::CastlingKs) > 0 {
        pos.enable_castling_right(Color::White, true);
    }

    if entry.get(Mask::CastlingQs) > 0 {
        pos.enable_castling_right(Color::White, false);
    }

    let ep_file = entry.get(Mask::EpFile);
    if ep_file < 8 {
        pos.set_ep_square(Some(square(ep_file as u8, 5)));
    }

    batch.stm_scores[entry_idx] = entry.stm_score;
    batch.stm_results[entry_idx] = entry.get(Mask::StmResult) as f32 / 2.0;

    let moves = legal_moves(&pos);
    assert!(!moves.is_empty() && moves.len() <= MAX_MOVES_PER_POS);

    let best_move = Move::from_u16(entry.best_move);
    let mut best_move_found = false;

    for (i, mv) in moves.iter().enumerate() {
        let oriented = if stm_xor == 7 { mv.files_flipped() } else { *mv };

        batch.legal_moves_idxs[entry_idx * MAX_MOVES_PER_POS + i] = move_index(oriented) as i16;

        if *mv == best_move {
            batch.best_move_idx[entry_idx] = i as u8;
            best_move_found = true;
        }
    }

    assert!(best_move_found, "best move {best_move} is not legal");

    for i in moves.len()..MAX_MOVES_PER_POS {
        batch.legal_moves_idxs[entry_idx * MAX_MOVES_PER_POS + i] = -1;
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use starway_chess::bitboard::{C1, E1, F1};
    use starway_chess::moves::FLAG_QUIET;

    fn decode_single(entry: &DataEntry) -> BatchBuffer {
        let mut batch = BatchBuffer::new(1);
        decode_entry(entry, 0, &mut batch);
        batch
    }

    #[test]
    fn king_on_left_files_mirrors_stm_features() {
        // King on c1: every stm feature square is XORed with 7.
        let pos = Position::from_fen("4k3/8/8/8/8/8/8/2K5 w - - 0 1").unwrap();
        let entry = DataEntry::new(&pos, 1, 0, Move::new(C1, C1 + 1, FLAG_QUIET));
        let batch = decode_single(&entry);

        // c1 mirrors to f1; piece type king = 5, not in check.
        assert_eq!(batch.active_features_stm[0], 5 * 64 + i16::from(C1 ^ 7));

        // Their king e8 from the stm perspective: color 1, square e8 ^ 7.
        assert_eq!(
            batch.active_features_stm[1],
            384 + 5 * 64 + i16::from((E1 ^ 56) ^ 7)
        );

        assert_eq!(batch.active_features_stm[2], -1);
    }

    #[test]
    fn king_on_right_files_keeps_squares() {
        let pos = Position::from_fen("4k3/8/8/8/8/8/8/5K2 w - - 0 1").unwrap();
        let entry = DataEntry::new(&pos, 1, 0, Move::new(F1, F1 + 1, FLAG_QUIET));
        let batch = decode_single(&entry);

        assert_eq!(batch.active_features_stm[0], 5 * 64 + i16::from(F1));
    }

    #[test]
    fn ntm_features_flip_rank_and_color() {
        let pos = Position::from_fen("4k3/8/8/8/8/8/8/5K2 w - - 0 1").unwrap();
        let entry = DataEntry::new(&pos, 1, 0, Move::new(F1, F1 + 1, FLAG_QUIET));
        let batch = decode_single(&entry);

        // Their king on e8 has file e, so no mirror; the ntm perspective
        // sees our f1 king as an enemy king on f8.
        assert_eq!(batch.active_features_ntm[0], 384 + 5 * 64 + i16::from(F1 ^ 56));
        assert_eq!(batch.active_features_ntm[1], 5 * 64 + i16::from(E1 ^ 56 ^ 56));
    }

    #[test]
    fn in_check_shifts_the_feature_block() {
        let pos = Position::from_fen("4k3/8/8/8/7b/8/8/4K3 w - - 0 1").unwrap();
        let entry = DataEntry::new(&pos, 1, 0, Move::new(E1, E1 + 1, FLAG_QUIET));
        let batch = decode_single(&entry);

        for idx in 0..3 {
            assert!(batch.active_features_stm[idx] >= 768);
            assert!(batch.active_features_ntm[idx] >= 768);
        }
    }

    #[test]
    fn legal_moves_and_best_move_index() {
        let pos = Position::from_fen(starway_chess::position::START_FEN).unwrap();
        let best = Move::new(square(6, 0), square(5, 2), FLAG_QUIET);
        let entry = DataEntry::new(&pos, 1, 40, best);
        let batch = decode_single(&entry);

        let moves: Vec<i16> =
            batch.legal_moves_idxs.iter().copied().take_while(|&idx| idx >= 0).collect();
        assert_eq!(moves.len(), 20);

        // Every index is a distinct policy class below the castling pair.
        let mut sorted = moves.clone();
        sorted.sort_unstable();
        sorted.dedup();
        assert_eq!(sorted.len(), 20);
        assert!(sorted.iter().all(|&idx| (0..1880).contains(&idx)));

        assert_eq!(batch.legal_moves_idxs[20..MAX_MOVES_PER_POS].iter().max(), Some(&-1));

        // The reconstructed move list must contain the best move where the
        // index claims.
        let oriented = entry.reconstruct();
        let legal = legal_moves(&oriented);
        assert_eq!(legal[usize::from(batch.best_move_idx[0])], best);
    }

    #[test]
    fn scores_and_results_copied() {
        let pos = Position::from_fen(starway_chess::position::START_FEN).unwrap();
        let entry = DataEntry::new(&pos, 2, -321, Move::new(square(6, 0), square(5, 2), FLAG_QUIET));
        let batch = decode_single(&entry);

        assert_eq!(batch.stm_scores[0], -321);
        assert_eq!(batch.stm_results[0], 1.0);
    }

    #[test]
    fn castling_rights_restored_for_movegen() {
        let pos = Position::from_fen("4k3/8/8/8/8/8/8/R3K2R w KQ - 0 1").unwrap();
        let entry = DataEntry::new(&pos, 1, 0, Move::new(E1, E1 + 1, FLAG_QUIET));
        let batch = decode_single(&entry);

        let classes: Vec<i16> =
            batch.legal_moves_idxs.iter().copied().take_while(|&idx| idx >= 0).collect();

        assert!(classes.contains(&1880));
        assert!(classes.contains(&1881));
    }
}
