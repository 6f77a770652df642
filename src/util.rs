/*
 * Copyright 2018 Ian Johnson
 *
 * This is free software, distributed under the MIT license.  A copy of the
 * license can be found in the LICENSE file in the project root, or at
 * https://opensource.org/licenses/MIT.
 */

//! Various utility functions.

/// Formats a block of memory as a hex dump, sixteen bytes per line, each
/// line prefixed with the address of its first byte.
pub fn hex_dump(bytes: &[u8], base: usize) -> String {
    bytes
        .chunks(16)
        .enumerate()
        .map(|(i, row)| {
            let row = row.iter()
                .map(|b| format!("{:02X}", b))
                .collect::<Vec<_>>()
                .join(" ");
            format!("{:03X}: {}", base + 16 * i, row)
        })
        .collect::<Vec<_>>()
        .join("\n")
}
