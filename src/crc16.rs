//! CRC-16/XMODEM, keyed by block version.
//!
//! # Open question (resolved)
//! The on-wire CRC uses poly `0x1021`, no input/output reflection, no
//! XOR-out, and an **initial value equal to the block's version number**
//! rather than the conventional `0x0000`. This is unusual but frozen —
//! existing `.sbx` files depend on it. Do not "normalise" to `init = 0`.

use crc::{Algorithm, Crc};

const POLY: u16 = 0x1021;

fn algorithm(init: u16) -> Algorithm<u16> {
    Algorithm {
        width: 16,
        poly: POLY,
        init,
        refin: false,
        refout: false,
        xorout: 0x0000,
        check: 0x0000,
        residue: 0x0000,
    }
}

/// Compute CRC-16/XMODEM over `data` with `init = version`.
pub fn crc16(version: u8, data: &[u8]) -> u16 {
    let algo = algorithm(version as u16);
    Crc::<u16>::new(&algo).checksum(data)
}
