use anyhow::{Result, anyhow};
use clap::Parser;
use config::FileFormat;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::format::FmtSpan;

use worldwrite::block::BlockState;
use worldwrite::coords::{BlockPos, CCoords};
use worldwrite::memory::MemoryWorld;
use worldwrite::settings::{Settings, WorldSettings};
use worldwrite::side_effect::{SideEffect, SideEffectConfig, SideEffectState};
use worldwrite::wna::{SectionBuffer, set_block};

#[derive(Debug, clap::Parser)]
struct Cli {
    #[arg(long, default_value_t = false)]
    no_color: bool,
    #[arg(short, long)]
    config: Vec<String>,

    #[clap(subcommand)]
    command: Commands,
}

#[derive(Debug, clap::Subcommand)]
enum Commands {
    /// Fill a cube of an empty in-memory world with one block
    Fill {
        name: String,
        /// Set a block state property
        #[arg(short, long, value_name = "PROP=VALUE")]
        prop: Vec<String>,
        /// Lowest corner of the cube
        #[arg(long, value_parser = parse_block_pos, default_value = "0,64,0")]
        from: BlockPos,
        /// Edge length of the cube
        #[arg(long, default_value_t = 16)]
        size: u32,
        /// Override a side effect for this fill
        #[arg(short, long, value_name = "NAME=on|off|unset")]
        effect: Vec<String>,
        /// Buffer whole sections and commit them at the end, instead of writing per block
        #[arg(long, default_value_t = false)]
        buffered: bool,
        /// Load the chunks outside the simulation radius
        #[arg(long, default_value_t = false)]
        no_ticking: bool,
    },
}

fn parse_block_pos(s: &str) -> Result<BlockPos, String> {
    let parts = s
        .split(',')
        .map(|part| part.trim().parse::<i32>().map_err(|err| err.to_string()))
        .collect::<Result<Vec<_>, _>>()?;
    match parts.as_slice() {
        [x, y, z] => Ok(BlockPos::new(*x, *y, *z)),
        _ => Err(format!("expected X,Y,Z, got {:?}", s)),
    }
}

fn parse_effect(raw: &str) -> Result<(SideEffect, SideEffectState)> {
    let Some((name, state)) = raw.split_once("=") else {
        return Err(anyhow!("invalid --effect argument: {:?}", raw));
    };
    Ok((name.parse()?, state.parse()?))
}

/// Highest corner of a cube of edge `size` from `from`, if the cube fits in the world.
fn fill_extent(from: BlockPos, size: u32, world: &WorldSettings) -> Result<BlockPos> {
    if size == 0 {
        return Err(anyhow!("--size must be at least 1"));
    }
    if size > world.height {
        return Err(anyhow!(
            "--size {} is larger than the world's height of {}",
            size,
            world.height
        ));
    }
    let last = i32::try_from(size - 1)?;
    let (Some(x), Some(y), Some(z)) = (
        from.x.checked_add(last),
        from.y.checked_add(last),
        from.z.checked_add(last),
    ) else {
        return Err(anyhow!("fill from {} with size {} is out of range", from, size));
    };
    let max_y = i64::from(world.min_y) + i64::from(world.height);
    if from.y < world.min_y || i64::from(y) >= max_y {
        return Err(anyhow!(
            "fill from y={} to y={} is outside the world's height",
            from.y,
            y
        ));
    }
    Ok(BlockPos::new(x, y, z))
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(!cli.no_color)
        .init();
    log::debug!("args: {:?}", cli);

    let mut builder = Settings::config_builder();
    for config_path in cli.config.iter() {
        builder = builder.add_source(config::File::new(config_path.as_str(), FileFormat::Toml));
    }
    let config = builder.build()?;
    let settings = Settings::from_config(&config)?;

    match &cli.command {
        Commands::Fill {
            name,
            prop,
            from,
            size,
            effect,
            buffered,
            no_ticking,
        } => {
            let to = fill_extent(*from, *size, &settings.world)?;
            let mut block_state = BlockState::new(name);
            for raw_prop in prop.iter() {
                let Some((key, value)) = raw_prop.split_once("=") else {
                    return Err(anyhow!("invalid --prop argument: {:?}", raw_prop));
                };
                block_state = block_state.with_property(key, value);
            }

            let mut effect_config = SideEffectConfig::new();
            for raw_effect in effect.iter() {
                let (effect, state) = parse_effect(raw_effect)?;
                effect_config = effect_config.with(effect, state);
            }
            let side_effects = effect_config.resolve(&settings.side_effects);
            log::info!("filling with {} using side effects {}", block_state, side_effects);

            let mut world = MemoryWorld::new(&settings);
            // One chunk of margin so neighbour updates at the edges stay inside loaded chunks
            let (low, high) = (from.offset(-16, 0, -16), to.offset(16, 0, 16));
            for cz in low.chunk_coords().z..=high.chunk_coords().z {
                for cx in low.chunk_coords().x..=high.chunk_coords().x {
                    world.load_chunk(CCoords::new(cx, cz), !no_ticking);
                }
            }

            let positions = (from.y..=to.y).flat_map(|y| {
                (from.z..=to.z).flat_map(move |z| (from.x..=to.x).map(move |x| BlockPos::new(x, y, z)))
            });
            let mut changed = 0usize;
            if *buffered {
                let mut buffer = SectionBuffer::new(side_effects);
                for pos in positions {
                    if buffer.set_block(&world, pos, &block_state) {
                        changed += 1;
                    }
                }
                let stats = buffer.commit(&mut world);
                println!(
                    "committed {} sections, {} blocks, {} block entities",
                    stats.sections, stats.blocks, stats.block_entities
                );
            } else {
                for pos in positions {
                    if set_block(&mut world, pos, &block_state, side_effects) {
                        changed += 1;
                    }
                }
            }
            println!("{} of {} blocks changed", changed, u64::from(*size).pow(3));
            for (hook, count) in world.hooks().counts() {
                println!("{:>24}: {}", hook, count);
            }
        }
    }

    Ok(())
}
