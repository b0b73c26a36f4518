//! Generate and inspect the binary image of the reader's tuning flash
//! partition.
//!
//! `gen` builds a partition image from a JSON description so production can
//! provision factory tuning data without running a search on every unit;
//! `dump` decodes an image back into the same JSON shape.

use std::fs;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};

use uhf_radio::tuning::channel_list::{ChannelList, MAX_CHANNEL_ITEMS};
use uhf_radio::tuning::flash::{
    channel_block_offset, profile_page_offset, CHANNEL_BLOCK_BYTES, FLASH_PAGE_BYTES,
    PARTITION_BYTES,
};
use uhf_radio::tuning::profile::Profile;
use uhf_radio::tuning::table::{TuningTable, MAX_FREQUENCY_ENTRIES};
use uhf_radio::tuning::{CapacitorSetting, ReflectedPower, MAX_ANTENNAS};

#[derive(Parser)]
#[command(about = "Tuning flash partition image tool", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Build a partition image from a JSON description.
    Gen {
        /// JSON description of tables and channel lists.
        input: PathBuf,
        /// Output image file.
        output: PathBuf,
    },
    /// Decode a partition image to JSON on stdout.
    Dump {
        /// Partition image file.
        image: PathBuf,
    },
}

#[derive(Serialize, Deserialize, Default)]
struct PartitionDoc {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    tables: Vec<TableDoc>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    channel_lists: Vec<ChannelListDoc>,
}

#[derive(Serialize, Deserialize)]
struct TableDoc {
    profile: String,
    entries: Vec<TableEntryDoc>,
}

#[derive(Serialize, Deserialize)]
struct TableEntryDoc {
    frequency: u32,
    antennas: Vec<TuningDoc>,
}

#[derive(Serialize, Deserialize, Clone, Copy, Default)]
struct TuningDoc {
    cin: u8,
    clen: u8,
    cout: u8,
    #[serde(default)]
    i: i16,
    #[serde(default)]
    q: i16,
}

#[derive(Serialize, Deserialize)]
struct ChannelListDoc {
    antenna: u8,
    #[serde(default)]
    persistent: bool,
    #[serde(default)]
    current_index: u8,
    items: Vec<ChannelItemDoc>,
}

#[derive(Serialize, Deserialize)]
struct ChannelItemDoc {
    frequency: u32,
    #[serde(flatten)]
    tuning: TuningDoc,
}

fn parse_profile(name: &str) -> Result<Profile> {
    let profile = match name.to_ascii_lowercase().as_str() {
        "europe" => Profile::Europe,
        "usa" => Profile::Usa,
        "japan" => Profile::Japan,
        "china" => Profile::China,
        "china2" => Profile::China2,
        "custom" => Profile::Custom,
        other => bail!("unknown profile '{other}'"),
    };
    Ok(profile)
}

fn profile_name(profile: Profile) -> &'static str {
    match profile {
        Profile::Europe => "europe",
        Profile::Usa => "usa",
        Profile::Japan => "japan",
        Profile::China => "china",
        Profile::China2 => "china2",
        Profile::Custom => "custom",
        Profile::NewTuning => "newtuning",
    }
}

fn build_table(doc: &TableDoc) -> Result<TuningTable> {
    let profile = parse_profile(&doc.profile)?;
    if doc.entries.len() > MAX_FREQUENCY_ENTRIES {
        bail!(
            "profile '{}': {} entries exceed the table capacity of {}",
            doc.profile,
            doc.entries.len(),
            MAX_FREQUENCY_ENTRIES
        );
    }

    let mut table = TuningTable::empty(profile);
    table.table_size = doc.entries.len() as u8;
    for (index, entry) in doc.entries.iter().enumerate() {
        if entry.antennas.len() > MAX_ANTENNAS {
            bail!(
                "profile '{}', entry {index}: more than {MAX_ANTENNAS} antennas",
                doc.profile
            );
        }
        let slot = &mut table.entries[index];
        slot.frequency = entry.frequency;
        for (antenna, tuning) in entry.antennas.iter().enumerate() {
            slot.caps[antenna] = CapacitorSetting::new(tuning.cin, tuning.clen, tuning.cout);
            slot.tuned_iq[antenna] = ReflectedPower::new(tuning.i, tuning.q);
        }
    }
    Ok(table)
}

fn build_channel_list(doc: &ChannelListDoc) -> Result<ChannelList> {
    if doc.antenna as usize >= MAX_ANTENNAS {
        bail!("channel list antenna {} out of range", doc.antenna);
    }
    if doc.items.len() > MAX_CHANNEL_ITEMS {
        bail!(
            "antenna {}: {} channels exceed the list capacity of {}",
            doc.antenna,
            doc.items.len(),
            MAX_CHANNEL_ITEMS
        );
    }

    let mut list = ChannelList::empty(doc.antenna);
    list.persistent = doc.persistent;
    list.n_frequencies = doc.items.len() as u8;
    list.current_index = if (doc.current_index as usize) < doc.items.len() {
        doc.current_index
    } else {
        0
    };
    for (item, doc_item) in list.items.iter_mut().zip(&doc.items) {
        item.frequency = doc_item.frequency;
        item.caps = CapacitorSetting::new(
            doc_item.tuning.cin,
            doc_item.tuning.clen,
            doc_item.tuning.cout,
        );
        item.tuned_iq = ReflectedPower::new(doc_item.tuning.i, doc_item.tuning.q);
    }
    Ok(list)
}

fn gen_image(doc: &PartitionDoc) -> Result<Vec<u8>> {
    let mut image = vec![0xFFu8; PARTITION_BYTES];

    for table_doc in &doc.tables {
        let table = build_table(table_doc)?;
        let offset = profile_page_offset(table.profile)
            .expect("parse_profile only yields legacy profiles") as usize;
        table.encode_image(&mut image[offset..offset + table.encoded_len()]);
    }

    for list_doc in &doc.channel_lists {
        let list = build_channel_list(list_doc)?;
        let offset = channel_block_offset(list.antenna) as usize;
        list.encode_into(&mut image[offset..offset + list.encoded_len()]);
    }

    Ok(image)
}

fn dump_image(image: &[u8]) -> Result<PartitionDoc> {
    if image.len() < PARTITION_BYTES {
        bail!(
            "image is {} bytes, expected at least {}",
            image.len(),
            PARTITION_BYTES
        );
    }

    let mut doc = PartitionDoc::default();

    for index in 0..Profile::COUNT as u8 {
        let profile = Profile::from_index(index).unwrap();
        let Some(offset) = profile_page_offset(profile) else {
            continue;
        };
        let page = &image[offset as usize..offset as usize + FLASH_PAGE_BYTES];
        let Some(table) = TuningTable::decode_image(profile, page) else {
            continue;
        };
        doc.tables.push(TableDoc {
            profile: profile_name(profile).to_string(),
            entries: (0..table.table_size as usize)
                .map(|entry| {
                    let slot = &table.entries[entry];
                    TableEntryDoc {
                        frequency: slot.frequency,
                        antennas: (0..MAX_ANTENNAS)
                            .map(|antenna| TuningDoc {
                                cin: slot.caps[antenna].cin,
                                clen: slot.caps[antenna].clen,
                                cout: slot.caps[antenna].cout,
                                i: slot.tuned_iq[antenna].i,
                                q: slot.tuned_iq[antenna].q,
                            })
                            .collect(),
                    }
                })
                .collect(),
        });
    }

    for antenna in 0..MAX_ANTENNAS as u8 {
        let offset = channel_block_offset(antenna) as usize;
        let block = &image[offset..offset + CHANNEL_BLOCK_BYTES];
        let Some(list) = ChannelList::decode_from(antenna, block) else {
            continue;
        };
        doc.channel_lists.push(ChannelListDoc {
            antenna,
            persistent: list.persistent,
            current_index: list.current_index,
            items: list.items[..list.n_frequencies as usize]
                .iter()
                .map(|item| ChannelItemDoc {
                    frequency: item.frequency,
                    tuning: TuningDoc {
                        cin: item.caps.cin,
                        clen: item.caps.clen,
                        cout: item.caps.cout,
                        i: item.tuned_iq.i,
                        q: item.tuned_iq.q,
                    },
                })
                .collect(),
        });
    }

    Ok(doc)
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Command::Gen { input, output } => {
            let text = fs::read_to_string(&input)
                .with_context(|| format!("reading {}", input.display()))?;
            let doc: PartitionDoc =
                serde_json::from_str(&text).context("parsing partition description")?;
            let image = gen_image(&doc)?;
            fs::write(&output, &image)
                .with_context(|| format!("writing {}", output.display()))?;
            eprintln!(
                "wrote {} ({} tables, {} channel lists)",
                output.display(),
                doc.tables.len(),
                doc.channel_lists.len()
            );
        }
        Command::Dump { image } => {
            let bytes =
                fs::read(&image).with_context(|| format!("reading {}", image.display()))?;
            let doc = dump_image(&bytes)?;
            println!("{}", serde_json::to_string_pretty(&doc)?);
        }
    }
    Ok(())
}
