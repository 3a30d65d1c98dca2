//! System bus memory access across every word-boundary combination.
//!
//! The bus moves whole 32-bit words, so every byte-granular access is a
//! composition of trimmed head words, whole middle words and merged tail
//! words. These tests sweep the combinations and check both what the
//! debugger reads back and what actually landed in the memory image.

use dbgsim::sim::testbench::{TestbenchDevice, TestbenchHandle, UNMAPPED_WORD};
use dbgsim::{Dmi, JtagDtm, Sim, Tap};

fn debug_module() -> (Dmi, TestbenchHandle) {
    let device = TestbenchDevice::new();
    let handle = device.handle();
    let sim = Sim::new(Box::new(device), 10, 0, None).unwrap();
    let mut dmi = Dmi::new(JtagDtm::new(Tap::new(sim)));
    dmi.dtm_reset().unwrap();
    dmi.select_hart(0).unwrap();
    dmi.halt_hart(0).unwrap();
    (dmi, handle)
}

/// Fill `words` consecutive words from `base` with a recognizable pattern
/// and return the matching little-endian byte image.
fn prefill(handle: &TestbenchHandle, base: u32, words: usize) -> Vec<u8> {
    let mut image = Vec::with_capacity(words * 4);
    for index in 0..words {
        let word = 0x8040_2010u32 ^ (index as u32 * 0x0101_0101);
        handle.poke_word(base + index as u32 * 4, word);
        image.extend_from_slice(&word.to_le_bytes());
    }
    image
}

#[test]
fn writes_preserve_every_untouched_neighbour_byte() {
    let (mut dmi, handle) = debug_module();

    for misalign in 0..4u32 {
        for size in 1..=13usize {
            // A fresh, isolated region per combination, with one guard
            // word on each side of the touched span.
            let base = 0x4000 + (misalign * 14 + size as u32) * 0x40;
            let address = base + 4 + misalign;

            let span_words = 3 + (misalign as usize + size).div_ceil(4);
            let mut image = prefill(&handle, base, span_words);

            let data: Vec<u8> = (0..size).map(|i| 0xc0 ^ (i as u8)).collect();
            dmi.write_mem(address, &data).unwrap();

            let offset = (address - base) as usize;
            image[offset..offset + size].copy_from_slice(&data);

            for index in 0..span_words {
                let word_address = base + index as u32 * 4;
                let expected =
                    u32::from_le_bytes(image[index * 4..index * 4 + 4].try_into().unwrap());
                assert_eq!(
                    handle.peek_word(word_address),
                    Some(expected),
                    "word {word_address:#x} after writing {size} bytes at misalignment {misalign}"
                );
            }
        }
    }
}

#[test]
fn reads_trim_head_and_tail_words() {
    let (mut dmi, handle) = debug_module();

    let base = 0x9000;
    let image = prefill(&handle, base, 12);

    for misalign in 0..4u32 {
        for size in [1usize, 2, 3, 4, 5, 8, 9, 15, 32] {
            let address = base + 4 + misalign;
            let mut buf = vec![0u8; size];
            dmi.read_mem(address, &mut buf).unwrap();

            let offset = (address - base) as usize;
            assert_eq!(
                buf,
                &image[offset..offset + size],
                "{size} bytes at misalignment {misalign}"
            );
        }
    }
}

#[test]
fn large_blocks_stream_through_autoincrement() {
    let (mut dmi, handle) = debug_module();

    let data: Vec<u8> = (0..129u32).map(|i| (i * 7 + 3) as u8).collect();
    dmi.write_mem(0xa001, &data).unwrap();

    let mut readback = vec![0u8; data.len()];
    dmi.read_mem(0xa001, &mut readback).unwrap();
    assert_eq!(readback, data);

    // Spot check the image: byte 0xa001+8 lives in the word at 0xa008.
    let word = handle.peek_word(0xa008).unwrap();
    assert_eq!((word >> 8) as u8, data[8]);
}

#[test]
fn reads_of_unmapped_words_see_the_bus_marker() {
    let (mut dmi, handle) = debug_module();

    // Map only the middle word of a three word span.
    handle.poke_word(0xb004, 0x1234_5678);

    let mut buf = [0u8; 12];
    dmi.read_mem(0xb000, &mut buf).unwrap();

    assert_eq!(u32::from_le_bytes(buf[0..4].try_into().unwrap()), UNMAPPED_WORD);
    assert_eq!(u32::from_le_bytes(buf[4..8].try_into().unwrap()), 0x1234_5678);
    assert_eq!(u32::from_le_bytes(buf[8..12].try_into().unwrap()), UNMAPPED_WORD);
}

#[test]
fn zero_length_accesses_touch_nothing() {
    let (mut dmi, handle) = debug_module();

    dmi.write_mem(0xc000, &[]).unwrap();
    dmi.read_mem(0xc000, &mut []).unwrap();
    assert_eq!(handle.peek_word(0xc000), None);
}

#[test]
fn aligned_single_word_writes_do_not_read_first() {
    let (mut dmi, handle) = debug_module();

    // A whole word needs no read-modify-write; it lands even where
    // nothing was mapped before.
    dmi.write_mem(0xd000, &[0x11, 0x22, 0x33, 0x44]).unwrap();
    assert_eq!(handle.peek_word(0xd000), Some(0x4433_2211));
}
