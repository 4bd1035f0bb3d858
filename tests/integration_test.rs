use sbxbox::block::{BlockCodec, BlockVersion};
use sbxbox::container::{decode_file, encode_file, DecodeOptions, EncodeOptions};
use sbxbox::driver::DecodeMode;
use sbxbox::recovery::reconstruct::{reconstruct, ReconstructOptions, Selector};
use sbxbox::recovery::scanner::{scan, ScanOptions};
use sbxbox::recovery::RecoveryIndex;
use sbxbox::uid::Uid;
use std::fs;
use std::io::Write;
use tempfile::{tempdir, NamedTempFile};

#[test]
fn encode_then_decode_recovers_original_bytes() {
    let dir = tempdir().unwrap();
    let source_path = dir.path().join("report.txt");
    let original = b"a modest file, carved into many small boxes".repeat(50);
    fs::write(&source_path, &original).unwrap();

    let container_path = dir.path().join("report.txt.sbx");
    let encode_report = encode_file(
        &source_path,
        &container_path,
        EncodeOptions {
            version: BlockVersion::V2,
            ..Default::default()
        },
    )
    .unwrap();
    assert!(encode_report.blocks_written > 1);

    let decoded_path = dir.path().join("report.out.txt");
    let decode_report = decode_file(
        &container_path,
        &decoded_path,
        DecodeOptions::default(),
    )
    .unwrap();
    assert!(decode_report.hash_checked);
    assert!(decode_report.hash_ok);

    let recovered = fs::read(&decoded_path).unwrap();
    assert_eq!(recovered, original);
}

#[test]
fn refusing_to_overwrite_an_existing_target() {
    let dir = tempdir().unwrap();
    let source_path = dir.path().join("a.bin");
    fs::write(&source_path, b"x").unwrap();
    let container_path = dir.path().join("a.bin.sbx");

    encode_file(&source_path, &container_path, EncodeOptions::default()).unwrap();
    let second = encode_file(&source_path, &container_path, EncodeOptions::default());
    assert!(matches!(second, Err(sbxbox::error::SbxError::TargetExists)));
}

#[test]
fn decode_test_only_checks_integrity_without_writing() {
    let dir = tempdir().unwrap();
    let source_path = dir.path().join("a.bin");
    fs::write(&source_path, b"integrity-only please").unwrap();
    let container_path = dir.path().join("a.bin.sbx");
    encode_file(&source_path, &container_path, EncodeOptions::default()).unwrap();

    let never_path = dir.path().join("never-written.bin");
    let report = decode_file(
        &container_path,
        &never_path,
        DecodeOptions {
            test_only: true,
            ..Default::default()
        },
    )
    .unwrap();
    assert!(report.hash_ok);
    assert!(!never_path.exists());
}

#[test]
fn a_single_corrupted_byte_fails_strict_decode_but_continue_mode_survives() {
    let dir = tempdir().unwrap();
    let source_path = dir.path().join("a.bin");
    fs::write(&source_path, vec![0x42u8; 4096]).unwrap();
    let container_path = dir.path().join("a.bin.sbx");
    encode_file(
        &source_path,
        &container_path,
        EncodeOptions {
            version: BlockVersion::V2,
            ..Default::default()
        },
    )
    .unwrap();

    // Flip a bit inside the second block's CRC-covered region.
    let mut bytes = fs::read(&container_path).unwrap();
    let block_size = BlockVersion::V2.block_size();
    bytes[block_size + 6] ^= 0x01;
    fs::write(&container_path, &bytes).unwrap();

    let strict_out = dir.path().join("strict.out");
    let strict = decode_file(&container_path, &strict_out, DecodeOptions::default());
    assert!(strict.is_err());

    let continue_out = dir.path().join("continue.out");
    let report = decode_file(
        &container_path,
        &continue_out,
        DecodeOptions {
            mode: DecodeMode::Continue,
            ..Default::default()
        },
    )
    .unwrap();
    assert!(report.missed_blocks >= 1);
}

#[test]
fn whitened_container_round_trips_with_matching_password() {
    let dir = tempdir().unwrap();
    let source_path = dir.path().join("secret.bin");
    fs::write(&source_path, b"only readable with the right password").unwrap();
    let container_path = dir.path().join("secret.bin.sbx");

    encode_file(
        &source_path,
        &container_path,
        EncodeOptions {
            password: Some("correct horse battery staple".into()),
            ..Default::default()
        },
    )
    .unwrap();

    // Plaintext magic must not appear on the wire.
    let on_wire = fs::read(&container_path).unwrap();
    assert_ne!(&on_wire[0..3], b"SBx");

    let decoded_path = dir.path().join("secret.out.bin");
    decode_file(
        &container_path,
        &decoded_path,
        DecodeOptions {
            password: Some("correct horse battery staple".into()),
            ..Default::default()
        },
    )
    .unwrap();
    assert_eq!(
        fs::read(&decoded_path).unwrap(),
        b"only readable with the right password"
    );
}

#[test]
fn scan_and_recover_reassembles_a_container_found_inside_raw_media() {
    let uid = Uid::random();
    let codec = BlockCodec::new(BlockVersion::V1, uid, None);
    let mut container_bytes = Vec::new();
    for n in 0..3u32 {
        let payload = if n == 0 {
            Vec::new()
        } else {
            vec![n as u8; codec.payload_size()]
        };
        container_bytes.extend(codec.encode(n, &payload, None).unwrap());
    }

    let mut disk_image = vec![0xFFu8; 64 * 1024];
    let embed_at = 20_000;
    disk_image[embed_at..embed_at + container_bytes.len()].copy_from_slice(&container_bytes);

    let image_file = NamedTempFile::new().unwrap();
    image_file.as_file().write_all(&disk_image).unwrap();

    let index_file = NamedTempFile::new().unwrap();
    let mut index = RecoveryIndex::create(index_file.path()).unwrap();
    let scan_report = scan(
        &mut index,
        &[image_file.path().to_path_buf()],
        &ScanOptions::new(BlockVersion::V1),
    )
    .unwrap();
    assert_eq!(scan_report.blocks_found, 3);

    let dest = tempdir().unwrap();
    let (outcomes, errors) = reconstruct(
        &index,
        &Selector::All,
        &ReconstructOptions {
            destination: dest.path().to_path_buf(),
            fill: false,
            overwrite: true,
            password: None,
        },
    )
    .unwrap();
    assert!(errors.is_empty());
    assert_eq!(outcomes.len(), 1);
    assert_eq!(outcomes[0].missing_blocks, 0);

    let rebuilt = fs::read(&outcomes[0].output_path).unwrap();
    assert_eq!(rebuilt, container_bytes);
}
