//! Filename sanitization
//!
//! Reduces a remote file path to the part that should resemble a track
//! title. Stages run in a fixed order; later stages assume earlier ones ran.
//! The stages are repeated until the name stops changing, so sanitizing an
//! already sanitized name is a no-op.

use crate::matcher::distance::edit_distance;
use crate::model::{ReleaseSpec, TrackSpec};
use once_cell::sync::Lazy;
use regex::Regex;
use std::borrow::Cow;
use tracing::trace;

/// "1-01 Title" on multi-disc releases
static MULTI_DISC_TRACK_NUMBER: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d+-\d+\s*").unwrap());
/// "A1 - Title" on vinyl rips
static VINYL_SIDE_TRACK_NUMBER: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z]\d{1,2}\s*-\s*").unwrap());
/// Any leading run of digits plus separators
static GENERIC_TRACK_NUMBER: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d+[\s.\-]*").unwrap());
static LEADING_GARBAGE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[\s.\-_]*").unwrap());
static FEATURED_ARTIST: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\s*\((?:feat|ft|featuring)[^(]+\)").unwrap());
/// Short suffix starting with a letter; "Mr. Blue" and "Vol.2" keep their dot
static EXTENSION: Lazy<Regex> = Lazy::new(|| Regex::new(r"\.([A-Za-z][A-Za-z0-9]{0,4})$").unwrap());

/// Final path component, in either Unix or Windows form
pub fn file_name(path: &str) -> &str {
    path.rsplit(&['/', '\\'][..]).next().unwrap_or(path)
}

/// Path minus its final component ("" for a bare name)
pub fn parent_directory(path: &str) -> &str {
    match path.rfind(&['/', '\\'][..]) {
        Some(index) => &path[..index],
        None => "",
    }
}

/// Lower-cased extension of the final path component, if it has one
pub fn extension(path: &str) -> Option<String> {
    EXTENSION
        .captures(file_name(path))
        .map(|caps| caps[1].to_lowercase())
}

/// Final path component without its extension
pub fn base_name(path: &str) -> String {
    EXTENSION.replace(file_name(path), "").into_owned()
}

/// First matching track-number pattern removed, whatever is left
fn remove_track_number(name: &str) -> Cow<'_, str> {
    if MULTI_DISC_TRACK_NUMBER.is_match(name) {
        return MULTI_DISC_TRACK_NUMBER.replace(name, "");
    }
    if VINYL_SIDE_TRACK_NUMBER.is_match(name) {
        return VINYL_SIDE_TRACK_NUMBER.replace(name, "");
    }
    GENERIC_TRACK_NUMBER.replace(name, "")
}

/// True when nothing but a track number and separators is left
fn is_only_track_number(name: &str) -> bool {
    let name = LEADING_GARBAGE.replace(name, "");
    LEADING_GARBAGE.replace(&remove_track_number(&name), "").is_empty()
}

/// Track number removed, unless the number is the whole title ("1979")
fn strip_track_number(name: &str) -> String {
    if is_only_track_number(name) {
        return name.to_string();
    }
    remove_track_number(name).into_owned()
}

/// Stages that run after artist and album stripping
fn finish(name: &str) -> String {
    let name = LEADING_GARBAGE.replace(name, "");
    let name = strip_track_number(&name);
    let name = LEADING_GARBAGE.replace(&name, "");
    let name = FEATURED_ARTIST.replace_all(&name, "");
    name.replace('\u{2019}', "'")
}

/// Whether a stripped name has no title left once the later stages run
fn leaves_no_title(name: &str) -> bool {
    is_only_track_number(name) || finish(name).is_empty()
}

fn literal(text: &str) -> Option<Regex> {
    if text.trim().is_empty() {
        return None;
    }
    Regex::new(&format!("(?i){}", regex::escape(text))).ok()
}

/// Whether some track title repeats the release name ("Kimono My House" on "Kimono My House")
fn has_title_track(album: &str, tracks: &[TrackSpec]) -> bool {
    let album_lower = album.to_lowercase();
    tracks
        .iter()
        .any(|t| t.title.to_lowercase().contains(&album_lower) || edit_distance(&t.title, album).is_some())
}

/// Sanitizer bound to one release's artist names and title
#[derive(Debug, Clone)]
pub struct Sanitizer {
    artists: Vec<Regex>,
    album: Option<Regex>,
    /// Album-name occurrences a file of this release legitimately carries
    expected_album_occurrences: usize,
}

impl Sanitizer {
    pub fn new(artists: &[String]) -> Self {
        let artists = artists.iter().filter_map(|a| literal(a)).collect();
        Self {
            artists,
            album: None,
            expected_album_occurrences: 0,
        }
    }

    pub fn for_release(release: &ReleaseSpec) -> Self {
        let mut sanitizer = Self::new(&release.artists);
        sanitizer.album = literal(&release.name);
        sanitizer.expected_album_occurrences = usize::from(has_title_track(&release.name, &release.tracks));
        sanitizer
    }

    pub fn sanitize(&self, filename: &str) -> String {
        let mut name = self.step(filename);
        // Every stage only removes text, so this settles
        loop {
            let next = self.step(&name);
            if next == name {
                return name;
            }
            name = next;
        }
    }

    fn step(&self, filename: &str) -> String {
        let name = base_name(filename);
        let name = html_escape::decode_html_entities(&name).into_owned();
        let name = self.strip_artists(&name);
        let name = self.strip_album(&name);
        finish(&name)
    }

    fn strip_artists(&self, name: &str) -> String {
        let stripped = self
            .artists
            .iter()
            .fold(name.to_string(), |acc, artist| artist.replace(&acc, "").into_owned());

        // The artist name is probably the track title too
        if stripped.len() != name.len() && leaves_no_title(&stripped) {
            trace!("Not stripping artist names from '{}', nothing would be left", name);
            return name.to_string();
        }
        stripped
    }

    fn strip_album(&self, name: &str) -> String {
        let Some(album) = &self.album else {
            return name.to_string();
        };
        if album.find_iter(name).count() <= self.expected_album_occurrences {
            return name.to_string();
        }

        let stripped = album.replace(name, "").into_owned();
        if leaves_no_title(&stripped) {
            trace!("Not stripping the release name from '{}', nothing would be left", name);
            return name.to_string();
        }
        stripped
    }
}

/// One-shot sanitization
pub fn sanitize(filename: &str, artists: &[String]) -> String {
    Sanitizer::new(artists).sanitize(filename)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sparks() -> Vec<String> {
        vec!["Sparks".to_string()]
    }

    fn interior_design() -> ReleaseSpec {
        ReleaseSpec::new(
            "Interior Design",
            sparks(),
            vec![TrackSpec::new("1", "So Important"), TrackSpec::new("2", "Lots Of Reasons")],
        )
    }

    fn kimono_my_house() -> ReleaseSpec {
        ReleaseSpec::new(
            "Kimono My House",
            sparks(),
            vec![
                TrackSpec::new("1", "This Town Ain't Big Enough for Both of Us"),
                TrackSpec::new("2", "Kimono My House"),
            ],
        )
    }

    #[test]
    fn test_path_helpers() {
        let path = "@@bhfrv\\Fonoteca\\Sparks\\1988 - Interior Design (Flac)\\01 - So Important.flac";
        assert_eq!(file_name(path), "01 - So Important.flac");
        assert_eq!(parent_directory(path), "@@bhfrv\\Fonoteca\\Sparks\\1988 - Interior Design (Flac)");
        assert_eq!(extension(path), Some("flac".to_string()));
        assert_eq!(base_name(path), "01 - So Important");
        assert_eq!(parent_directory("loose.mp3"), "");
        assert_eq!(base_name("music/Mr. Blue"), "Mr. Blue");
        assert_eq!(base_name("music/Vol.2"), "Vol.2");
        assert_eq!(extension("music/Vol.2"), None);
        assert_eq!(extension("music/track.MP3"), Some("mp3".to_string()));
    }

    #[test]
    fn test_strips_generic_track_number() {
        assert_eq!(sanitize("a\\b\\01 - So Important.flac", &sparks()), "So Important");
        assert_eq!(sanitize("a/b/07. Let's Go Surfing.mp3", &sparks()), "Let's Go Surfing");
    }

    #[test]
    fn test_strips_multi_disc_and_vinyl_numbers() {
        assert_eq!(sanitize("x\\1-04 Madonna.flac", &sparks()), "Madonna");
        assert_eq!(sanitize("x\\B2 - Side Two Opener.flac", &sparks()), "Side Two Opener");
    }

    #[test]
    fn test_keeps_numeric_titles() {
        assert_eq!(sanitize("x\\1979.flac", &sparks()), "1979");
        assert_eq!(sanitize("x\\01 - 1979.flac", &sparks()), "1979");
        assert_eq!(sanitize("x\\1-04 1979.flac", &sparks()), "1979");
        assert_eq!(sanitize("x\\07 - Vol.2.flac", &sparks()), "Vol.2");
    }

    #[test]
    fn test_strips_artist_before_track_number() {
        assert_eq!(sanitize("x\\Sparks - 03 - Lucky Me, Lucky You.flac", &sparks()), "Lucky Me, Lucky You");
    }

    #[test]
    fn test_keeps_artist_when_it_is_the_title() {
        assert_eq!(sanitize("x\\04 - Sparks.flac", &sparks()), "Sparks");
        assert_eq!(sanitize("x\\Sparks (feat. Jane Wiedlin).flac", &sparks()), "Sparks");
    }

    #[test]
    fn test_strips_unexpected_album_name() {
        let sanitizer = Sanitizer::for_release(&interior_design());
        assert_eq!(
            sanitizer.sanitize("x\\Sparks - Interior Design - 01 - So Important.flac"),
            "So Important"
        );
        assert_eq!(sanitizer.sanitize("x\\interior design - 02 - Lots Of Reasons.flac"), "Lots Of Reasons");
    }

    #[test]
    fn test_keeps_album_name_when_it_is_the_title() {
        let sanitizer = Sanitizer::for_release(&interior_design());
        assert_eq!(sanitizer.sanitize("x\\03 - Interior Design.flac"), "Interior Design");
    }

    #[test]
    fn test_title_track_keeps_one_album_name() {
        let sanitizer = Sanitizer::for_release(&kimono_my_house());
        assert_eq!(sanitizer.sanitize("x\\02 - Kimono My House.flac"), "Kimono My House");
        assert_eq!(
            sanitizer.sanitize("x\\Kimono My House - 02 - Kimono My House.flac"),
            "Kimono My House"
        );
    }

    #[test]
    fn test_title_track_detected_by_distance() {
        let release = ReleaseSpec::new("Lil' Beethoven", sparks(), vec![TrackSpec::new("1", "Lil Beethoven")]);
        let sanitizer = Sanitizer::for_release(&release);
        assert_eq!(sanitizer.expected_album_occurrences, 1);
        assert_eq!(Sanitizer::for_release(&interior_design()).expected_album_occurrences, 0);
    }

    #[test]
    fn test_unescapes_and_drops_featured_artists() {
        assert_eq!(
            sanitize("x\\05 Rock &amp; Roll (feat. Russell Mael).flac", &sparks()),
            "Rock & Roll"
        );
        assert_eq!(sanitize("x\\06 Don\u{2019}t Stop.flac", &sparks()), "Don't Stop");
    }

    #[test]
    fn test_sanitize_is_idempotent() {
        let names = [
            "@@music\\Sparks\\Interior Design\\01 - So Important.flac",
            "x\\Sparks - 03 - Lucky Me, Lucky You.flac",
            "x\\1-04 Madonna.flac",
            "x\\B2 - Side Two Opener.flac",
            "x\\04 - Sparks.flac",
            "x\\05 Rock &amp; Roll (feat. Russell Mael).flac",
            "x\\06 Don\u{2019}t Stop.flac",
            "music/Mr. Blue",
            "x\\01 - 1979.flac",
            "x\\07 - Vol.2.flac",
            "x\\1979.flac",
            "x\\01 - 99 Luftballons.flac",
            "x\\A1 - B2 - Nested.flac",
            "x\\Dr.Dre.mp3",
            "x\\AC/DC Tribute.flac",
            "x\\08 - &amp;amp;.flac",
            "x\\Interior Design - 01 - Interior Design.flac",
        ];
        for sanitizer in [Sanitizer::new(&sparks()), Sanitizer::for_release(&interior_design())] {
            for name in names {
                let once = sanitizer.sanitize(name);
                assert_eq!(sanitizer.sanitize(&once), once, "not idempotent for {}", name);
            }
        }
    }
}
