//! End-to-end scenarios exercising a driver through its public surface
//! rather than a single module's internals, mirroring the seed-test
//! style used across the example pack's own `tests/` directories.

use std::io::Cursor;

use xferx_core::{ByteFile, File, Filesystem};
use xferx_fs::rt11::Rt11Filesystem;
use xferx_fs::tss8::Bitmap;
use xferx_fs::unix::{UnixFilesystem, UnixVersion};

fn blank_device(blocks: u32) -> Box<dyn xferx_core::BlockDevice> {
    Box::new(ByteFile::new(Cursor::new(vec![0u8; blocks as usize * 512]), 512, blocks))
}

/// RT-11 init + copy + read: a freshly initialized volume accepts a
/// multi-block ASCII file and reads every line back unchanged.
#[test]
fn rt11_init_copy_read_round_trip() {
    let mut lines = String::new();
    for i in 0..50 {
        lines.push_str(&format!("{i:5} ABCDEFGHIJKLMNOPQRSTUVWXYZ01234567890\n"));
    }
    let content = lines.into_bytes();
    assert_eq!(content.len(), 2200);

    let mut fs = Rt11Filesystem::initialize(blank_device(500), 500).unwrap();
    {
        let mut file = fs.create_sized("TEST.TXT", content.len() as u64).unwrap();
        file.write(&content).unwrap();
        file.flush().unwrap();
    }

    let entries = fs.list("").unwrap();
    let entry = entries.iter().find(|e| e.name == "TEST.TXT").expect("file listed after create");
    assert!(entry.length_blocks as usize * 512 >= content.len());

    let mut readback = vec![0u8; entry.length_blocks as usize * 512];
    let mut file = fs.open("TEST.TXT").unwrap();
    let mut offset = 0;
    loop {
        let n = file.read(&mut readback[offset..]).unwrap();
        if n == 0 {
            break;
        }
        offset += n;
    }
    let trimmed = &readback[..content.len()];
    assert_eq!(trimmed, &content[..]);
    for (i, line) in lines_of(trimmed).enumerate().take(50) {
        assert!(line.starts_with(&format!("{i:5}")), "line {i} present and in order");
    }
}

fn lines_of(data: &[u8]) -> impl Iterator<Item = String> + '_ {
    String::from_utf8_lossy(data).lines().map(str::to_string).collect::<Vec<_>>().into_iter()
}

/// TSS/8 bitmap stability after transient allocation: growing then
/// shrinking an allocation back to its original size reproduces the
/// exact same bitmap bytes, not merely the same used-count.
#[test]
fn tss8_bitmap_stable_after_grow_and_shrink() {
    let mut bitmap = Bitmap::new(200);
    let b1 = bitmap.clone();

    let start = bitmap.allocate(5).unwrap();
    let b2 = bitmap.clone();
    assert_eq!(bitmap.used_count(), b1.used_count() + 5);

    bitmap.free(start, 5);
    bitmap.allocate(10).unwrap();
    assert_eq!(bitmap.used_count(), b1.used_count() + 10);

    bitmap.free(start, 10);
    bitmap.allocate(5).unwrap();
    assert_eq!(bitmap, b2);
}

/// UNIX v6 huge-file classification: a file is "huge" only when it is
/// both LARGE and its last indirect slot is populated; a merely-large
/// file with that slot still zero is not.
#[test]
fn unix_v6_huge_file_classification() {
    const V4_USED: u16 = 0o100000;
    const V4_LARGE: u16 = 0o010000;

    let mut data = vec![0u8; 512 * 10];
    let inode_table = &mut data[512 * 2..];

    // Inode 1: huge (LARGE, addr[7] != 0).
    inode_table[0..2].copy_from_slice(&(V4_USED | V4_LARGE).to_le_bytes());
    for i in 0..8u16 {
        let off = 8 + i as usize * 2;
        inode_table[off..off + 2].copy_from_slice(&(100 + i).to_le_bytes());
    }

    // Inode 2 (at offset 32): large but not huge (addr[7] == 0).
    let e2 = 32;
    inode_table[e2..e2 + 2].copy_from_slice(&(V4_USED | V4_LARGE).to_le_bytes());
    for i in 0..7u16 {
        let off = e2 + 8 + i as usize * 2;
        inode_table[off..off + 2].copy_from_slice(&(200 + i).to_le_bytes());
    }

    let device = Box::new(ByteFile::new(Cursor::new(data), 512, 10));
    let mut fs = UnixFilesystem::mount(device, UnixVersion::V6, true).unwrap();

    let huge = fs.read_inode(1).unwrap();
    assert!(huge.is_large());
    assert!(huge.is_huge());
    assert_ne!(huge.addr[7], 0);

    let large_only = fs.read_inode(2).unwrap();
    assert!(large_only.is_large());
    assert!(!large_only.is_huge());
    assert_eq!(large_only.addr[7], 0);
}
