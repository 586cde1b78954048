//! Lyrics scraping and cleaning over a full song page

use songstats::extractors::genius_client::scrape_lyrics;
use songstats::extractors::lyrics_cleaner::clean_lyrics;

const SONG_PAGE: &str = r#"<!DOCTYPE html>
<html>
<head><title>Weezer - Island In The Sun Lyrics | Genius Lyrics</title></head>
<body>
  <div class="header">Weezer</div>
  <div data-lyrics-container="true">12 Contributors<br>Island In The Sun Lyrics<br>[Verse 1: Rivers Cuomo]<br>When you're on a holiday (Hip hip)<br>You can't find the words to say<br><br><br><br>[Chorus]<br>On an <a href="/annotations/1"><span>island in the sun</span></a><br><div data-exclude-from-selection="true">See Weezer Live</div>Get tickets as low as $45<br>We'll be playing and having fun2Embed</div>
  <div class="footer">About Genius</div>
</body>
</html>"#;

#[test]
fn test_song_page_yields_clean_lyrics() {
    let lyrics = scrape_lyrics(SONG_PAGE).unwrap();

    assert!(lyrics.raw.starts_with("12 Contributors\n"));
    assert_eq!(
        lyrics.cleaned,
        "When you're on a holiday\n\
         You can't find the words to say\n\
         \n\
         On an island in the sun\n\
         We'll be playing and having fun"
    );
}

#[test]
fn test_cleaning_scraped_lyrics_twice_is_stable() {
    let lyrics = scrape_lyrics(SONG_PAGE).unwrap();
    assert_eq!(clean_lyrics(&lyrics.cleaned), lyrics.cleaned);
}

#[test]
fn test_page_with_only_boilerplate_has_no_lyrics() {
    let html = r#"<div data-lyrics-container="true">3 Contributors<br>Untitled Lyrics<br>[Instrumental]<br>Embed</div>"#;
    assert!(scrape_lyrics(html).is_none());
}
