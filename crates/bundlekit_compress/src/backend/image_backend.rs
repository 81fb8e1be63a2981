use std::io::Cursor;

use anyhow::Error;
use async_trait::async_trait;
use bundlekit_core::diagnostic_error;
use bundlekit_filesystem::FileSystemRef;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::CompressionType;
use image::codecs::png::FilterType;
use image::codecs::png::PngEncoder;
use image::codecs::webp::WebPEncoder;
use image::DynamicImage;
use image::ImageReader;

use super::BackendCapabilities;
use super::CompressBackend;
use crate::format::FormatOptions;
use crate::job::CompressJob;

/// Encodes png, jpg and webp in process with the `image` crate.
#[derive(Debug)]
pub struct ImageBackend {
  fs: FileSystemRef,
}

impl ImageBackend {
  pub fn new(fs: FileSystemRef) -> Self {
    ImageBackend { fs }
  }
}

#[async_trait]
impl CompressBackend for ImageBackend {
  fn capabilities(&self) -> BackendCapabilities {
    BackendCapabilities {
      parallel: true,
      child_process: false,
    }
  }

  #[tracing::instrument(level = "debug", skip_all, fields(asset = %job.asset_id))]
  async fn encode(&self, job: &CompressJob) -> anyhow::Result<()> {
    let source = self.fs.read(&job.source_path)?;
    let options = job.options.clone();

    // Encoding is CPU bound, keep it off the scheduler's control loop
    let bytes = tokio::task::spawn_blocking(move || encode_image(&source, &options)).await??;

    self.fs.write(&job.dest_path, &bytes)?;
    Ok(())
  }
}

fn encode_image(source: &[u8], options: &FormatOptions) -> Result<Vec<u8>, Error> {
  let img = ImageReader::new(Cursor::new(source))
    .with_guessed_format()?
    .decode()?;

  let mut bytes: Vec<u8> = Vec::new();
  match options {
    FormatOptions::Png(options) => {
      let compression = match options.quality {
        0..=33 => CompressionType::Fast,
        34..=66 => CompressionType::Default,
        _ => CompressionType::Best,
      };
      img.write_with_encoder(PngEncoder::new_with_quality(
        &mut bytes,
        compression,
        FilterType::Adaptive,
      ))?;
    }
    FormatOptions::Jpg(options) => {
      // jpeg has no alpha channel
      let rgb = DynamicImage::ImageRgb8(img.to_rgb8());
      rgb.write_with_encoder(JpegEncoder::new_with_quality(
        &mut bytes,
        options.quality.clamp(1, 100),
      ))?;
    }
    FormatOptions::Webp(_) => {
      let rgba = DynamicImage::ImageRgba8(img.to_rgba8());
      rgba.write_with_encoder(WebPEncoder::new_lossless(&mut bytes))?;
    }
    other => {
      return Err(diagnostic_error!(
        "Unsupported output format for the image backend: {}",
        other.format()
      ))
    }
  }

  Ok(bytes)
}
