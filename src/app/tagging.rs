//! Track tags and cover art processing
//!
//! Thin wrappers over `lofty` and `image`. Both run synchronously; the
//! session calls them from blocking tasks.

use std::fs::File;
use std::io::{BufWriter, Cursor, Write};
use std::path::{Path, PathBuf};

use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::DynamicImage;
use lofty::config::WriteOptions;
use lofty::file::{AudioFile, TaggedFileExt};
use lofty::picture::{Picture, PictureType};
use lofty::prelude::Accessor;
use lofty::read_from_path;
use lofty::tag::{ItemKey, Tag};

use crate::app::models::{Album, Track};
use crate::constants::defaults::COVER_ART_JPEG_QUALITY;
use crate::errors::{TagError, TagResult};

/// Writes metadata and cover art into a downloaded track
pub trait TagWriter: Send + Sync {
    /// Tags the file at `path`
    ///
    /// Album and track metadata are written when `write_metadata` is set;
    /// `artwork` (encoded image bytes) becomes the front cover when present.
    fn write_tags(
        &self,
        path: &Path,
        album: &Album,
        track: &Track,
        artwork: Option<&[u8]>,
        write_metadata: bool,
    ) -> TagResult<()>;
}

/// What to do with a downloaded cover art file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArtworkOptions {
    /// Re-encode as JPEG
    pub convert_to_jpeg: bool,
    /// Shrink so that neither edge exceeds this many pixels
    pub max_size: Option<u32>,
}

impl ArtworkOptions {
    pub fn is_noop(&self) -> bool {
        !self.convert_to_jpeg && self.max_size.is_none()
    }
}

/// Converts and resizes cover art in place
pub trait ArtworkProcessor: Send + Sync {
    /// Processes the image at `path`, returning the path of the result
    ///
    /// Conversion to JPEG changes the extension to `.jpg`.
    fn process(&self, path: &Path, options: ArtworkOptions) -> TagResult<PathBuf>;
}

/// [`TagWriter`] backed by lofty
#[derive(Debug, Default, Clone, Copy)]
pub struct LoftyTagWriter;

impl TagWriter for LoftyTagWriter {
    fn write_tags(
        &self,
        path: &Path,
        album: &Album,
        track: &Track,
        artwork: Option<&[u8]>,
        write_metadata: bool,
    ) -> TagResult<()> {
        let mut tagged_file = read_from_path(path)?;
        let tag_type = tagged_file.primary_tag_type();
        if tagged_file.tag(tag_type).is_none() {
            tagged_file.insert_tag(Tag::new(tag_type));
        }

        let tag = tagged_file
            .tag_mut(tag_type)
            .ok_or_else(|| TagError::NoWritableTag {
                path: path.to_path_buf(),
            })?;

        if write_metadata {
            tag.set_album(album.title.clone());
            tag.set_artist(album.artist.clone());
            tag.insert_text(ItemKey::AlbumArtist, album.artist.clone());
            tag.set_title(track.title.clone());
            tag.set_track(track.number);
            tag.insert_text(ItemKey::Year, album.year().to_string());
            if let Some(lyrics) = &track.lyrics {
                tag.insert_text(ItemKey::Lyrics, lyrics.clone());
            }
        }

        if let Some(data) = artwork {
            let mut picture = Picture::from_reader(&mut Cursor::new(data))?;
            picture.set_pic_type(PictureType::CoverFront);
            tag.remove_picture_type(PictureType::CoverFront);
            tag.push_picture(picture);
        }

        tagged_file.save_to_path(path, WriteOptions::default())?;
        tracing::debug!("Tagged {}", path.display());
        Ok(())
    }
}

/// [`ArtworkProcessor`] backed by the image crate
#[derive(Debug, Default, Clone, Copy)]
pub struct ImageArtworkProcessor;

impl ArtworkProcessor for ImageArtworkProcessor {
    fn process(&self, path: &Path, options: ArtworkOptions) -> TagResult<PathBuf> {
        if options.is_noop() {
            return Ok(path.to_path_buf());
        }

        let mut image = image::open(path)?;
        if let Some(max_size) = options.max_size {
            if image.width() > max_size || image.height() > max_size {
                image = image.resize(max_size, max_size, FilterType::Lanczos3);
            }
        }

        if !options.convert_to_jpeg {
            image.save(path)?;
            return Ok(path.to_path_buf());
        }

        let output = path.with_extension("jpg");
        let rgb = DynamicImage::ImageRgb8(image.to_rgb8());
        let mut writer = BufWriter::new(File::create(&output)?);
        rgb.write_with_encoder(JpegEncoder::new_with_quality(
            &mut writer,
            COVER_ART_JPEG_QUALITY,
        ))?;
        writer.flush()?;

        if output != path {
            std::fs::remove_file(path)?;
        }
        Ok(output)
    }
}
