mod compression;
mod config;
mod report;

use std::error::Error;
use std::fs::File;
use std::io::BufReader;

use bytes::BytesMut;
use cobble_nbt::{read_nbt, write_nbt, NbtRoot};
use cobble_proto::codec::{ProtoDecode, ProtoEncode};
use cobble_proto::packets::ChunkDataAndLight;
use cobble_proto::types::ChunkPos;
use cobble_world::chunk::{OVERWORLD_MIN_SECTION, OVERWORLD_SECTION_COUNT};
use cobble_world::flat_generator::{generate_flat_chunk, FlatSettings};
use cobble_world::save::SaveChunk;
use cobble_world::{BiomeRegistry, BlockStateRegistry, Chunk};
use config::{ChunkToolConfig, OutputFormat};
use report::ChunkReport;
use tracing::{debug, error, info, warn};

/// Data version written for generated chunks (1.20.1).
const DATA_VERSION: i32 = 3465;

fn main() {
    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "chunktool.toml".into());
    let config = match ChunkToolConfig::load(&path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load {path}: {e}");
            std::process::exit(1);
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.logging.level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();

    info!("cobble-chunktool v{}", env!("CARGO_PKG_VERSION"));

    if let Err(e) = run(&config) {
        error!("{e}");
        std::process::exit(1);
    }
}

fn run(config: &ChunkToolConfig) -> Result<(), Box<dyn Error>> {
    if let Some(path) = &config.registry.blocks {
        let file = BufReader::new(File::open(path)?);
        let registry = BlockStateRegistry::from_report_reader(file)?;
        info!("Loaded {} block states from {path}", registry.len());
        BlockStateRegistry::install(registry).map_err(|_| "block registry already installed")?;
    }
    let blocks = BlockStateRegistry::global();
    let biomes = BiomeRegistry::vanilla();

    let save = match &config.input.path {
        Some(path) => {
            info!("Reading chunk from {path}");
            let raw = std::fs::read(path)?;
            let nbt = compression::decompress(&raw, config.input.compression)?;
            let root = read_nbt(&mut nbt.as_slice())?;
            SaveChunk::from_nbt(&root.compound)?
        }
        None => {
            info!("No input path configured, checking a generated flat chunk");
            flat_save(blocks, biomes)?
        }
    };

    let chunk = Chunk::from_save(&save, blocks, biomes)?;
    let pos = ChunkPos::new(save.x_pos, save.z_pos);

    let mut wire = BytesMut::new();
    chunk.to_packet(pos).proto_encode(&mut wire);
    let packet_bytes = wire.len();
    let packet = ChunkDataAndLight::proto_decode(&mut wire.freeze())?;
    let received = Chunk::read_body(
        &mut packet.body.clone(),
        chunk.sections.len(),
        chunk.trust_edges.is_some(),
    )?;
    let round_trip = packet.pos == pos
        && received.sections == chunk.sections
        && received.block_entities == chunk.block_entities;
    if round_trip {
        debug!(%pos, packet_bytes, "wire round trip matched");
    } else {
        warn!(%pos, "chunk changed on the wire round trip");
    }

    let report = ChunkReport::new(&save, &chunk, packet_bytes, round_trip);
    match config.output.format {
        OutputFormat::Text => print!("{report}"),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
    }

    if let Some(out) = &config.output.save_path {
        let mut rewritten = save.clone();
        chunk.to_save(&mut rewritten, blocks, biomes)?;
        let mut buf = BytesMut::new();
        write_nbt(&mut buf, &NbtRoot::new("", rewritten.to_nbt()));
        std::fs::write(out, compression::gzip(&buf)?)?;
        info!("Wrote re-encoded chunk to {out}");
    }

    Ok(())
}

/// A classic flat overworld chunk at the origin, in save layout.
fn flat_save(blocks: &BlockStateRegistry, biomes: &BiomeRegistry) -> Result<SaveChunk, Box<dyn Error>> {
    let settings = FlatSettings::classic(blocks, biomes)?;
    let chunk = generate_flat_chunk(&settings, OVERWORLD_SECTION_COUNT);
    let mut save = SaveChunk {
        data_version: DATA_VERSION,
        y_pos: OVERWORLD_MIN_SECTION,
        ..Default::default()
    };
    chunk.to_save(&mut save, blocks, biomes)?;
    Ok(save)
}
