use std::path::PathBuf;

use clap::{Parser, Subcommand};
use h4mk::container::reader::ContainerReader;
use h4mk::{decode_chain, recovery};
use serde::Serialize;

#[derive(Parser)]
#[command(name = "h4mk", version = "1.0.0", about = "The H4MK transport container CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print container metadata, tracks, and block descriptors as JSON
    Manifest { input: PathBuf },
    /// Resolve the decode chain for a track at a given time
    Seek {
        input: PathBuf,
        #[arg(short, long)]
        track: String,
        #[arg(long = "pts-us")]
        pts_us: u64,
    },
    /// Inspect a single CORE block
    Block {
        input: PathBuf,
        #[arg(short, long)]
        index: u32,
        /// Write the raw (still compressed/encrypted) payload to stdout
        #[arg(long)]
        raw: bool,
    },
    /// Decrypt and decompress a single CORE block from an encrypted container
    Decrypt {
        input: PathBuf,
        #[arg(short, long)]
        index: u32,
        /// Passphrase to derive the ratchet shared secret (Argon2id, per
        /// `crypto::derive_shared_secret`); real deployments pass the
        /// shared secret out of band instead.
        #[arg(long)]
        passphrase: String,
        #[arg(long)]
        salt: String,
        /// Out-of-band ratchet context string the producer used when it
        /// initialized its cipher (never stored in the container itself).
        #[arg(long)]
        context: String,
    },
    /// Verify container integrity (CRCs and the trailing VERI chunk)
    Verify { input: PathBuf },
    /// Scan a possibly-corrupt container without trusting VERI
    Recover {
        input: PathBuf,
        /// Write a container containing only the healthy chunks
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Serialize)]
struct ManifestOutput<'a> {
    producer: &'a str,
    created_at_unix: i64,
    encrypted: bool,
    compression: &'a h4mk::compressor::EngineInfo,
    tracks: Vec<String>,
    block_count: usize,
    trak: &'a [h4mk::seek_index::TrakEntry],
}

#[derive(Serialize)]
struct SeekOutput {
    track: String,
    pts_us: u64,
    chain: Vec<ChainStepOutput>,
    next_state_seed: Option<u32>,
}

#[derive(Serialize)]
struct ChainStepOutput {
    core_index: u32,
    pts_us: u64,
    kind: &'static str,
}

#[derive(Serialize)]
struct VerifyOutput {
    valid: bool,
}

fn main() {
    if let Err(err) = run() {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    match Cli::parse().command {
        Commands::Manifest { input } => {
            let bytes = std::fs::read(&input)?;
            let reader = ContainerReader::parse(&bytes)?;
            let mut tracks: Vec<String> = Vec::new();
            for e in reader.trak() {
                if !tracks.contains(&e.track_id) {
                    tracks.push(e.track_id.clone());
                }
            }
            let out = ManifestOutput {
                producer: &reader.meta().producer,
                created_at_unix: reader.meta().created_at_unix,
                encrypted: reader.meta().encrypted,
                compression: &reader.meta().compression,
                tracks,
                block_count: reader.core_len(),
                trak: reader.trak(),
            };
            println!("{}", serde_json::to_string_pretty(&out)?);
        }

        Commands::Seek { input, track, pts_us } => {
            let bytes = std::fs::read(&input)?;
            let reader = ContainerReader::parse(&bytes)?;
            let resolved = decode_chain::decode_chain(&reader, &track, pts_us)?;
            let out = SeekOutput {
                track,
                pts_us,
                chain: resolved
                    .steps
                    .into_iter()
                    .map(|c| ChainStepOutput {
                        core_index: c.core_index,
                        pts_us: c.pts_us,
                        kind: match c.kind {
                            h4mk::seek_index::BlockKindTag::I => "I",
                            h4mk::seek_index::BlockKindTag::P => "P",
                            h4mk::seek_index::BlockKindTag::B => "B",
                        },
                    })
                    .collect(),
                next_state_seed: resolved.next_state_seed,
            };
            println!("{}", serde_json::to_string_pretty(&out)?);
        }

        Commands::Block { input, index, raw } => {
            let bytes = std::fs::read(&input)?;
            let reader = ContainerReader::parse(&bytes)?;
            let payload = reader.raw_core_block(index)?;
            if raw {
                use std::io::Write;
                std::io::stdout().write_all(payload)?;
            } else {
                println!(
                    "{}",
                    serde_json::json!({
                        "index": index,
                        "length": payload.len(),
                        "encrypted": reader.meta().encrypted,
                    })
                );
            }
        }

        Commands::Decrypt { input, index, passphrase, salt, context } => {
            let bytes = std::fs::read(&input)?;
            let reader = ContainerReader::parse(&bytes)?;
            let secret = h4mk::crypto::derive_shared_secret(&passphrase, salt.as_bytes())
                .map_err(|e| format!("key derivation failed: {e}"))?;
            // The writer's cipher sends on its own "send" chain; the CLI
            // reads it back on the mirrored "recv" chain, same as any
            // other peer built with `init_peer_from_shared_secret`.
            let mut cipher = h4mk::ratchet::LivingState::init_peer_from_shared_secret(
                &secret,
                context.as_bytes(),
                h4mk::ratchet::RatchetParams::default(),
            );
            let entry = reader
                .trak()
                .get(index as usize)
                .ok_or(h4mk::H4mkError::OutOfRange { index, count: reader.core_len() as u32 })?;
            let aad = h4mk::crypto::aad::AadContext {
                engine_id: &reader.meta().compression.engine_id,
                fingerprint_hex: &reader.meta().compression.fingerprint,
                container_id_hex: &reader.meta().container_id_hex,
                track_id: &entry.track_id,
                pts_us: entry.pts_us,
                chunk_index: entry.core_index,
            }
            .build();
            let compressed = reader.decrypt_core_block(index, &mut cipher, &aad)?;
            let plain = h4mk::compressor::RleEngine.decompress(&compressed)?;
            use std::io::Write;
            std::io::stdout().write_all(&plain)?;
        }

        Commands::Verify { input } => {
            let bytes = std::fs::read(&input)?;
            let reader = ContainerReader::parse(&bytes)?;
            let valid = reader.verify_integrity()?;
            println!("{}", serde_json::to_string_pretty(&VerifyOutput { valid })?);
        }

        Commands::Recover { input, output } => {
            let bytes = std::fs::read(&input)?;
            let report = recovery::scan(&bytes);
            println!("{}", report.summary());
            println!(
                "{}",
                serde_json::json!({
                    "total_scanned": report.total_scanned,
                    "healthy_chunks": report.healthy_chunks,
                    "corrupt_chunks": report.corrupt_chunks,
                    "truncated_chunks": report.truncated_chunks,
                    "quality": format!("{:?}", report.quality),
                })
            );

            if let Some(output) = output {
                let mut rebuilt = Vec::new();
                rebuilt.extend_from_slice(h4mk::chunks::MAGIC);
                rebuilt.extend_from_slice(&h4mk::chunks::VERSION.to_be_bytes());
                rebuilt.extend_from_slice(&0u16.to_be_bytes());
                for chunk in &report.chunk_log {
                    if chunk.health.is_usable() {
                        let end = chunk.archive_offset as usize
                            + 12
                            + u32::from_be_bytes(
                                bytes[chunk.archive_offset as usize + 4..chunk.archive_offset as usize + 8]
                                    .try_into()
                                    .unwrap(),
                            ) as usize;
                        rebuilt.extend_from_slice(&bytes[chunk.archive_offset as usize..end]);
                    }
                }
                std::fs::write(&output, &rebuilt)?;
                println!("Recovered container written to {}", output.display());
            }
        }
    }

    Ok(())
}
