use std::collections::BTreeMap;
use std::fmt::Display;
use std::fmt::Formatter;
use std::path::Path;

use serde::Deserialize;
use serde::Serialize;

pub const MAX_QUALITY: u8 = 100;
pub const DEFAULT_QUALITY: u8 = 80;

/// The kinds of output a texture can be compressed to
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CompressFormat {
  Png,
  Jpg,
  Webp,
  Pvrtc,
  Etc,
  Astc,
}

impl CompressFormat {
  pub fn name(&self) -> &'static str {
    match self {
      CompressFormat::Png => "png",
      CompressFormat::Jpg => "jpg",
      CompressFormat::Webp => "webp",
      CompressFormat::Pvrtc => "pvrtc",
      CompressFormat::Etc => "etc",
      CompressFormat::Astc => "astc",
    }
  }

  pub fn extension(&self) -> &'static str {
    match self {
      CompressFormat::Png => "png",
      CompressFormat::Jpg => "jpg",
      CompressFormat::Webp => "webp",
      CompressFormat::Pvrtc => "pvr",
      CompressFormat::Etc => "pkm",
      CompressFormat::Astc => "astc",
    }
  }

  /// Whether a source file with this extension is already encoded in this format.
  pub fn matches_extension(&self, extension: &str) -> bool {
    let extension = extension.to_ascii_lowercase();
    match self {
      CompressFormat::Jpg => extension == "jpg" || extension == "jpeg",
      other => extension == other.extension(),
    }
  }
}

impl Display for CompressFormat {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    f.write_str(self.name())
  }
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QualityOptions {
  #[serde(default = "default_quality")]
  pub quality: u8,
}

impl Default for QualityOptions {
  fn default() -> Self {
    QualityOptions {
      quality: DEFAULT_QUALITY,
    }
  }
}

fn default_quality() -> u8 {
  DEFAULT_QUALITY
}

#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PvrtcQuality {
  Fastest,
  Fast,
  #[default]
  Normal,
  High,
  Best,
}

#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PvrtcOptions {
  #[serde(default)]
  pub alpha: bool,
  #[serde(default)]
  pub quality: PvrtcQuality,
}

#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EtcVersion {
  Etc1,
  #[default]
  Etc2,
}

#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EtcQuality {
  #[default]
  Fast,
  Slow,
}

#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EtcOptions {
  #[serde(default)]
  pub version: EtcVersion,
  #[serde(default)]
  pub alpha: bool,
  #[serde(default)]
  pub quality: EtcQuality,
}

#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub enum AstcBlockSize {
  #[serde(rename = "4x4")]
  B4x4,
  #[serde(rename = "5x5")]
  B5x5,
  #[default]
  #[serde(rename = "6x6")]
  B6x6,
  #[serde(rename = "8x8")]
  B8x8,
  #[serde(rename = "10x10")]
  B10x10,
  #[serde(rename = "12x12")]
  B12x12,
}

impl AstcBlockSize {
  pub fn as_str(&self) -> &'static str {
    match self {
      AstcBlockSize::B4x4 => "4x4",
      AstcBlockSize::B5x5 => "5x5",
      AstcBlockSize::B6x6 => "6x6",
      AstcBlockSize::B8x8 => "8x8",
      AstcBlockSize::B10x10 => "10x10",
      AstcBlockSize::B12x12 => "12x12",
    }
  }
}

#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AstcQuality {
  VeryFast,
  Fast,
  #[default]
  Medium,
  Thorough,
  Exhaustive,
}

#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AstcOptions {
  #[serde(default)]
  pub block_size: AstcBlockSize,
  #[serde(default)]
  pub quality: AstcQuality,
}

/// Options for a single output format.
///
/// Serialized with the format kind as a tag, e.g.
/// `{ "format": "astc", "blockSize": "8x8", "quality": "thorough" }`.
#[derive(Clone, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(tag = "format", rename_all = "lowercase")]
pub enum FormatOptions {
  Png(QualityOptions),
  Jpg(QualityOptions),
  Webp(QualityOptions),
  Pvrtc(PvrtcOptions),
  Etc(EtcOptions),
  Astc(AstcOptions),
}

impl FormatOptions {
  pub fn format(&self) -> CompressFormat {
    match self {
      FormatOptions::Png(_) => CompressFormat::Png,
      FormatOptions::Jpg(_) => CompressFormat::Jpg,
      FormatOptions::Webp(_) => CompressFormat::Webp,
      FormatOptions::Pvrtc(_) => CompressFormat::Pvrtc,
      FormatOptions::Etc(_) => CompressFormat::Etc,
      FormatOptions::Astc(_) => CompressFormat::Astc,
    }
  }

  pub fn extension(&self) -> &'static str {
    self.format().extension()
  }

  pub fn is_highest_quality(&self) -> bool {
    match self {
      FormatOptions::Png(options) | FormatOptions::Jpg(options) | FormatOptions::Webp(options) => {
        options.quality >= MAX_QUALITY
      }
      FormatOptions::Pvrtc(options) => options.quality == PvrtcQuality::Best,
      FormatOptions::Etc(options) => options.quality == EtcQuality::Slow,
      FormatOptions::Astc(options) => options.quality == AstcQuality::Exhaustive,
    }
  }

  /// Whether `source` is already encoded in the output format of these options.
  pub fn accepts_source(&self, source: &Path) -> bool {
    source
      .extension()
      .and_then(|extension| extension.to_str())
      .is_some_and(|extension| self.format().matches_extension(extension))
  }

  /// Values substituted into external tool argument templates.
  ///
  /// Every format provides `quality`; block formats add their own settings.
  pub fn template_values(&self) -> BTreeMap<&'static str, String> {
    let mut values = BTreeMap::new();
    match self {
      FormatOptions::Png(options) | FormatOptions::Jpg(options) | FormatOptions::Webp(options) => {
        values.insert("quality", options.quality.to_string());
      }
      FormatOptions::Pvrtc(options) => {
        let quality = match options.quality {
          PvrtcQuality::Fastest => "pvrtcfastest",
          PvrtcQuality::Fast => "pvrtcfast",
          PvrtcQuality::Normal => "pvrtcnormal",
          PvrtcQuality::High => "pvrtchigh",
          PvrtcQuality::Best => "pvrtcbest",
        };
        values.insert("quality", quality.to_string());
        let format = if options.alpha {
          "PVRTC1_4"
        } else {
          "PVRTC1_4_RGB"
        };
        values.insert("pixel_format", format.to_string());
      }
      FormatOptions::Etc(options) => {
        let quality = match options.quality {
          EtcQuality::Fast => "etcfast",
          EtcQuality::Slow => "etcslow",
        };
        values.insert("quality", quality.to_string());
        let format = match (options.version, options.alpha) {
          (EtcVersion::Etc1, _) => "ETC1",
          (EtcVersion::Etc2, false) => "ETC2_RGB",
          (EtcVersion::Etc2, true) => "ETC2_RGBA",
        };
        values.insert("pixel_format", format.to_string());
      }
      FormatOptions::Astc(options) => {
        let quality = match options.quality {
          AstcQuality::VeryFast => "veryfast",
          AstcQuality::Fast => "fast",
          AstcQuality::Medium => "medium",
          AstcQuality::Thorough => "thorough",
          AstcQuality::Exhaustive => "exhaustive",
        };
        values.insert("quality", quality.to_string());
        values.insert("block", options.block_size.as_str().to_string());
      }
    }
    values
  }
}
