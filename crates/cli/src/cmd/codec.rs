use anyhow::{bail, Context};
use clap::Args;
use ensgraph_core::{
    b256_to_token_id, check_valid_label, decode_name, decode_name_hex, encode_name, eth_subnode,
    labelhash, namehash, token_label_id,
};
use serde::Serialize;

#[derive(Debug, Args)]
pub struct NameArgs {
    /// Dotted name, e.g. `alice.eth`.
    pub name: String,
}

#[derive(Debug, Args)]
pub struct LabelArgs {
    /// A single label, without dots.
    pub label: String,
}

#[derive(Debug, Args)]
pub struct DecodeArgs {
    /// Hex wire-format name, `0x` prefix optional.
    pub hex: String,
}

pub fn run_namehash(args: NameArgs) -> anyhow::Result<()> {
    println!("{}", full_hex(namehash(&args.name)));
    Ok(())
}

pub fn run_labelhash(args: LabelArgs) -> anyhow::Result<()> {
    if !check_valid_label(&args.label) {
        bail!("label must not contain '.' or a null byte: {:?}", args.label);
    }
    println!("{}", full_hex(labelhash(&args.label)));
    Ok(())
}

pub fn run_decode_name(args: DecodeArgs) -> anyhow::Result<()> {
    let decoded = decode_name_hex(&args.hex).context("invalid hex input")?;
    let Some(decoded) = decoded else {
        bail!("not a valid DNS wire-format name");
    };
    let out = DecodedVector {
        first_label: decoded.first_label,
        name: decoded.name,
    };
    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(())
}

pub fn run_encode_name(args: NameArgs) -> anyhow::Result<()> {
    let Some(encoded) = encode_name(&args.name) else {
        bail!(
            "cannot encode {:?}: labels must be 1-255 bytes without a null byte",
            args.name
        );
    };
    println!("{}", full_hex(encoded));
    Ok(())
}

fn full_hex(bytes: impl AsRef<[u8]>) -> String {
    format!("0x{}", hex::encode(bytes))
}

pub fn run_vectors() -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(&generate_vectors())?);
    Ok(())
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Vectors {
    namehash: Vec<NamehashVector>,
    labels: Vec<LabelVector>,
    dns: Vec<DnsVector>,
}

#[derive(Debug, Serialize)]
struct NamehashVector {
    name: String,
    node: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct LabelVector {
    label: String,
    labelhash: String,
    /// Registrar token id, decimal.
    token_id: String,
    /// Registration id derived from the token id.
    label_id: String,
    /// Node of `<label>.eth`.
    eth_node: String,
}

#[derive(Debug, Serialize)]
struct DnsVector {
    encoded: String,
    decoded: Option<DecodedVector>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DecodedVector {
    first_label: String,
    name: String,
}

fn generate_vectors() -> Vectors {
    let names = ["", "eth", "alice.eth", "pay.alice.eth", "foo.eth."];
    let labels = ["eth", "alice", "vitalik", "\u{1F980}"];
    let encodings: Vec<Vec<u8>> = vec![
        b"\x05alice\x03eth\x00".to_vec(),
        vec![0],
        b"\x03a.b\x03eth\x00".to_vec(),
        b"\x05alice\x03eth".to_vec(),
        vec![],
    ];

    Vectors {
        namehash: names
            .iter()
            .map(|name| NamehashVector {
                name: name.to_string(),
                node: full_hex(namehash(name)),
            })
            .collect(),
        labels: labels
            .iter()
            .map(|label| {
                let hash = labelhash(label);
                let token_id = b256_to_token_id(&hash);
                LabelVector {
                    label: label.to_string(),
                    labelhash: full_hex(hash),
                    token_id: token_id.to_string(),
                    label_id: token_label_id(&token_id),
                    eth_node: full_hex(eth_subnode(&token_id)),
                }
            })
            .collect(),
        dns: encodings
            .iter()
            .map(|bytes| DnsVector {
                encoded: full_hex(bytes),
                decoded: decode_name(bytes).map(|d| DecodedVector {
                    first_label: d.first_label,
                    name: d.name,
                }),
            })
            .collect(),
    }
}
