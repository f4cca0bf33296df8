//! Sniffing of loaded asset bytes.
//!
//! Only the metadata the editor core needs is extracted: the container
//! format, image dimensions, and for glTF the skin joints and animation names.

use std::io::Cursor;

use serde::Deserialize;

const GLB_MAGIC: &[u8; 4] = b"glTF";
const GLB_JSON_CHUNK: u32 = 0x4E4F_534A;
const FBX_BINARY_MAGIC: &[u8] = b"Kaydara FBX Binary";

#[derive(Debug, Clone, PartialEq)]
pub enum AssetFormat {
    /// glTF JSON or binary GLB
    Gltf(GltfSummary),
    Fbx,
    Image { width: u32, height: u32 },
}

impl AssetFormat {
    pub fn is_model(&self) -> bool {
        matches!(self, AssetFormat::Gltf(_) | AssetFormat::Fbx)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct GltfSummary {
    pub joints: Vec<JointInfo>,
    pub animations: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct JointInfo {
    pub name: String,
    pub translation: [f32; 3],
    pub rotation: [f32; 4],
}

pub fn sniff(bytes: &[u8]) -> Result<AssetFormat, String> {
    if bytes.starts_with(GLB_MAGIC) {
        return glb_json(bytes).and_then(parse_gltf_json).map(AssetFormat::Gltf);
    }
    if bytes.starts_with(FBX_BINARY_MAGIC) || is_ascii_fbx(bytes) {
        return Ok(AssetFormat::Fbx);
    }
    if bytes.iter().find(|b| !b.is_ascii_whitespace()) == Some(&b'{') {
        return parse_gltf_json(bytes).map(AssetFormat::Gltf);
    }

    let reader = image::ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| e.to_string())?;
    if reader.format().is_none() {
        return Err("unrecognised asset format".to_string());
    }
    let (width, height) = reader.into_dimensions().map_err(|e| e.to_string())?;
    Ok(AssetFormat::Image { width, height })
}

fn is_ascii_fbx(bytes: &[u8]) -> bool {
    let head = &bytes[..bytes.len().min(256)];
    std::str::from_utf8(head).is_ok_and(|text| text.trim_start().starts_with("; FBX"))
}

fn read_u32(bytes: &[u8], offset: usize) -> Option<u32> {
    let word = bytes.get(offset..offset + 4)?;
    Some(u32::from_le_bytes([word[0], word[1], word[2], word[3]]))
}

/// JSON chunk of a GLB container
fn glb_json(bytes: &[u8]) -> Result<&[u8], String> {
    let chunk_len = read_u32(bytes, 12).ok_or("truncated GLB header")? as usize;
    let chunk_type = read_u32(bytes, 16).ok_or("truncated GLB header")?;
    if chunk_type != GLB_JSON_CHUNK {
        return Err("GLB does not start with a JSON chunk".to_string());
    }
    bytes
        .get(20..20 + chunk_len)
        .ok_or_else(|| "truncated GLB JSON chunk".to_string())
}

#[derive(Deserialize)]
struct GltfDocument {
    #[allow(dead_code)]
    asset: serde_json::Value,
    #[serde(default)]
    nodes: Vec<GltfNode>,
    #[serde(default)]
    skins: Vec<GltfSkin>,
    #[serde(default)]
    animations: Vec<GltfAnimation>,
}

#[derive(Deserialize)]
struct GltfNode {
    name: Option<String>,
    translation: Option<[f32; 3]>,
    rotation: Option<[f32; 4]>,
}

#[derive(Deserialize)]
struct GltfSkin {
    joints: Vec<usize>,
}

#[derive(Deserialize)]
struct GltfAnimation {
    name: Option<String>,
}

fn parse_gltf_json(json: &[u8]) -> Result<GltfSummary, String> {
    let doc: GltfDocument =
        serde_json::from_slice(json).map_err(|e| format!("invalid glTF: {e}"))?;

    let joints = doc
        .skins
        .first()
        .map(|skin| {
            skin.joints
                .iter()
                .map(|&index| {
                    let node = doc.nodes.get(index);
                    JointInfo {
                        name: node
                            .and_then(|n| n.name.clone())
                            .unwrap_or_else(|| format!("joint_{index}")),
                        translation: node.and_then(|n| n.translation).unwrap_or([0.0; 3]),
                        rotation: node
                            .and_then(|n| n.rotation)
                            .unwrap_or([0.0, 0.0, 0.0, 1.0]),
                    }
                })
                .collect()
        })
        .unwrap_or_default();

    let animations = doc
        .animations
        .iter()
        .enumerate()
        .map(|(i, anim)| anim.name.clone().unwrap_or_else(|| format!("animation_{i}")))
        .collect();

    Ok(GltfSummary { joints, animations })
}

#[cfg(test)]
pub(crate) mod fixtures {
    /// Minimal glTF with a two-joint skin and two animations
    pub const RIGGED_GLTF: &str = r#"{
        "asset": {"version": "2.0"},
        "nodes": [
            {"name": "Body"},
            {"name": "Hips", "translation": [0.0, 1.0, 0.0]},
            {"name": "Spine", "rotation": [0.0, 0.0, 0.0, 1.0]}
        ],
        "skins": [{"joints": [1, 2]}],
        "animations": [{"name": "Idle"}, {"name": "Walk"}]
    }"#;

    pub fn glb(json: &str) -> Vec<u8> {
        let mut chunk = json.as_bytes().to_vec();
        while chunk.len() % 4 != 0 {
            chunk.push(b' ');
        }
        let total = 12 + 8 + chunk.len();
        let mut bytes = Vec::with_capacity(total);
        bytes.extend_from_slice(b"glTF");
        bytes.extend_from_slice(&2u32.to_le_bytes());
        bytes.extend_from_slice(&(total as u32).to_le_bytes());
        bytes.extend_from_slice(&(chunk.len() as u32).to_le_bytes());
        bytes.extend_from_slice(&0x4E4F_534Au32.to_le_bytes());
        bytes.extend_from_slice(&chunk);
        bytes
    }

    pub fn png(width: u32, height: u32) -> Vec<u8> {
        let image = image::RgbaImage::new(width, height);
        let mut bytes = Vec::new();
        image
            .write_to(&mut std::io::Cursor::new(&mut bytes), image::ImageFormat::Png)
            .unwrap();
        bytes
    }
}
