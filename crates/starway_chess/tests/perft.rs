//! Published perft counts: https://www.chessprogramming.org/Perft_Results
//!
//! The heaviest nodes are `#[ignore]`d; run them with `--ignored` when
//! touching the move generator.

use starway_chess::perft::perft;
use starway_chess::position::{Position, START_FEN};

const KIWIPETE: &str = "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq -";
const POSITION_3: &str = "8/2p5/3p4/KP5r/1R3p1k/8/4P1P1/8 w - - 0 1";
const POSITION_4: &str = "r3k2r/Pppp1ppp/1b3nbN/nP6/BBP1P3/q4N2/Pp1P2PP/R2Q1RK1 w kq - 0 1";
const POSITION_4_MIRRORED: &str = "r2q1rk1/pP1p2pp/Q4n2/bbp1p3/Np6/1B3NBn/pPPP1PPP/R3K2R b KQ - 0 1";
const POSITION_5: &str = "rnbq1k1r/pp1Pbppp/2p5/8/2B5/8/PPP1NnPP/RNBQK2R w KQ - 1 8";

fn parse(fen: &str) -> Position {
    let pos = Position::from_fen(fen).unwrap();
    pos.validate();
    pos
}

#[test]
fn depth_zero_and_below() {
    let pos = parse(START_FEN);
    assert_eq!(perft(&pos, 0), 1);
    assert_eq!(perft(&pos, -1), 1);
}

#[test]
fn depth_one() {
    assert_eq!(perft(&parse(START_FEN), 1), 20);
    assert_eq!(perft(&parse(KIWIPETE), 1), 48);
    assert_eq!(perft(&parse(POSITION_3), 1), 14);
    assert_eq!(perft(&parse(POSITION_4), 1), 6);
    assert_eq!(perft(&parse(POSITION_4_MIRRORED), 1), 6);
    assert_eq!(perft(&parse(POSITION_5), 1), 44);
}

#[test]
fn startpos_shallow() {
    let pos = parse(START_FEN);
    assert_eq!(perft(&pos, 2), 400);
    assert_eq!(perft(&pos, 3), 8902);
    assert_eq!(perft(&pos, 4), 197_281);
}

#[test]
fn kiwipete_shallow() {
    let pos = parse(KIWIPETE);
    assert_eq!(perft(&pos, 2), 2039);
    assert_eq!(perft(&pos, 3), 97_862);
}

#[test]
fn position_3_shallow() {
    let pos = parse(POSITION_3);
    assert_eq!(perft(&pos, 2), 191);
    assert_eq!(perft(&pos, 3), 2812);
    assert_eq!(perft(&pos, 4), 43_238);
}

#[test]
fn position_4_shallow() {
    assert_eq!(perft(&parse(POSITION_4), 2), 264);
    assert_eq!(perft(&parse(POSITION_4), 3), 9467);
    assert_eq!(perft(&parse(POSITION_4_MIRRORED), 2), 264);
    assert_eq!(perft(&parse(POSITION_4_MIRRORED), 3), 9467);
}

#[test]
#[ignore]
fn startpos_deep() {
    let pos = parse(START_FEN);
    assert_eq!(perft(&pos, 5), 4_865_609);
    assert_eq!(perft(&pos, 6), 119_060_324);
}

#[test]
#[ignore]
fn kiwipete_deep() {
    let pos = parse(KIWIPETE);
    assert_eq!(perft(&pos, 4), 4_085_603);
    assert_eq!(perft(&pos, 5), 193_690_690);
}
