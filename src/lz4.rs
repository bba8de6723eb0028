//! LZ4 block-stream decompression, as framed on ZFS data blocks: a 4-byte
//! big-endian length prefix (handled by the pool reader, not here) followed
//! by one or more LZ4 "blocks" in the raw token/literal/lookback format
//! (not the xxhash-framed LZ4 frame format).
//!
//! A truncated or malformed trailing block does not abort the whole
//! decompression: on error we return whatever literal/lookback output had
//! already been produced rather than `Err`, matching how real-world pool
//! images with a torn final block are best served by partial recovery.
use crate::byte_iter::ByteIter;

/// Decompresses a stream of LZ4 blocks, returning as much output as could be
/// produced before any parse error. A completely empty or immediately
/// malformed stream yields an empty buffer, not an error.
pub fn decompress_blocks(data: &mut impl Iterator<Item = u8>) -> Vec<u8> {
    let mut output_buf = Vec::new();
    loop {
        let Some(token) = data.next() else { break };
        let mut literal_size: usize = ((token & 0xF0) >> 4).into();
        let mut lookback_size: usize = (token & 0x0F).into();

        // Handle extended literal sizes
        if literal_size == 0xF {
            loop {
                let Some(extended_size) = data.next() else {
                    return output_buf;
                };
                literal_size += extended_size as usize;
                if extended_size != 0xFF {
                    break;
                }
            }
        }

        // Copy literal_size bytes to output_buf
        for _ in 0..literal_size {
            let Some(byte) = data.next() else {
                return output_buf;
            };
            output_buf.push(byte);
        }

        let Some(lookback) = data.read_u16_le() else {
            // Reached end of stream. Clean only if this block carried no
            // lookback; otherwise it was cut short mid-block, but either
            // way we stop with whatever output we have so far.
            break;
        };

        if lookback as usize > output_buf.len() || lookback == 0 {
            // Invalid backreference; nothing further can be trusted.
            break;
        }

        // Handle extended lookback sizes
        if lookback_size == 0xF {
            loop {
                let Some(extended_size) = data.next() else {
                    return output_buf;
                };
                lookback_size += extended_size as usize;
                if extended_size != 0xFF {
                    break;
                }
            }
        }
        lookback_size += 4;

        // Repeat lookback_size bytes from lookback bytes ago. This can copy
        // more bytes than the lookback distance because the source region
        // grows while we read from it (self-overlapping copy): lookback=1,
        // lookback_size=4, tail=[0] produces [0, 0, 0, 0, 0].
        let mut lookback_pos = output_buf.len() - usize::from(lookback);
        for _ in 0..lookback_size {
            output_buf.push(output_buf[lookback_pos]);
            lookback_pos += 1;
        }
    }
    output_buf
}
