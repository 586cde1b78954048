//! Output column registry
//!
//! Every field a source can produce is listed here with its owning source
//! and write policy. Table sync consults this table to decide whether a
//! value may be written and whether its column may be created.

use crate::types::Source;

/// How a field is written to an existing row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WritePolicy {
    /// Written whenever it differs from the current cell
    Overwrite,
    /// Written only into an empty cell (or one holding the failed-lookup marker)
    FillIfEmpty,
    /// Like `Overwrite`, but never creates the column
    ExistingColumnOnly,
    /// Like `FillIfEmpty`, but never creates the column
    ExistingColumnFillIfEmpty,
}

impl WritePolicy {
    pub fn creates_column(self) -> bool {
        matches!(self, WritePolicy::Overwrite | WritePolicy::FillIfEmpty)
    }

    pub fn fill_only(self) -> bool {
        matches!(
            self,
            WritePolicy::FillIfEmpty | WritePolicy::ExistingColumnFillIfEmpty
        )
    }
}

/// One output column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub source: Source,
    pub policy: WritePolicy,
}

const fn spec(name: &'static str, source: Source, policy: WritePolicy) -> FieldSpec {
    FieldSpec {
        name,
        source,
        policy,
    }
}

pub const TRACK_ID: &str = "track_id";
pub const SONG_POPULARITY: &str = "song_popularity";
pub const DURATION: &str = "duration";
pub const TEMPO: &str = "tempo_spotify";
pub const ENERGY: &str = "energy";
pub const DANCEABILITY: &str = "danceability";
pub const ARTIST_ID: &str = "artist_id";
pub const YEAR: &str = "year";
pub const GENRES: &str = "genres";
pub const VALENCE: &str = "spotify_valence";
pub const LOUDNESS: &str = "spotify_loudness";
pub const YOUTUBE_VIEWS: &str = "youtube_views";
pub const YOUTUBE_VIDEO_ID: &str = "youtube_video_id";
pub const LYRICS: &str = "lyrics";
pub const GENIUS_URL: &str = "genius_url";

/// Required input columns
pub const ARTIST_NAME: &str = "artist_name";
pub const SONG_TITLE: &str = "song_title";
/// Optional input column marking cover versions with `x`
pub const COVER: &str = "cover";

/// Marker older sheets left in cells after a failed lyrics lookup
pub const FAILED_LOOKUP_MARKER: &str = "!";

/// All output columns, grouped by source
pub const FIELDS: &[FieldSpec] = &[
    spec(TRACK_ID, Source::Catalog, WritePolicy::Overwrite),
    spec(SONG_POPULARITY, Source::Catalog, WritePolicy::Overwrite),
    spec(DURATION, Source::Catalog, WritePolicy::Overwrite),
    spec(TEMPO, Source::Catalog, WritePolicy::Overwrite),
    spec(ENERGY, Source::Catalog, WritePolicy::Overwrite),
    spec(DANCEABILITY, Source::Catalog, WritePolicy::Overwrite),
    spec(ARTIST_ID, Source::Catalog, WritePolicy::FillIfEmpty),
    spec(YEAR, Source::Catalog, WritePolicy::FillIfEmpty),
    spec(GENRES, Source::Catalog, WritePolicy::ExistingColumnFillIfEmpty),
    spec(VALENCE, Source::Catalog, WritePolicy::ExistingColumnOnly),
    spec(LOUDNESS, Source::Catalog, WritePolicy::ExistingColumnOnly),
    spec(YOUTUBE_VIEWS, Source::VideoViews, WritePolicy::Overwrite),
    spec(YOUTUBE_VIDEO_ID, Source::VideoViews, WritePolicy::ExistingColumnOnly),
    spec(LYRICS, Source::Lyrics, WritePolicy::FillIfEmpty),
    spec(GENIUS_URL, Source::Lyrics, WritePolicy::ExistingColumnOnly),
];

/// Look up a field by column name
pub fn field_spec(name: &str) -> Option<&'static FieldSpec> {
    FIELDS.iter().find(|f| f.name == name)
}

/// Fields owned by one source
pub fn fields_for(source: Source) -> impl Iterator<Item = &'static FieldSpec> {
    FIELDS.iter().filter(move |f| f.source == source)
}

/// Whether an existing cell counts as empty for fill-only fields
pub fn is_blank_cell(cell: &str) -> bool {
    let cell = cell.trim();
    cell.is_empty() || cell == FAILED_LOOKUP_MARKER
}
