//! NFO description files read by media servers

use crate::utils::xml_escape;
use std::fmt::Write;

const HEADER: &str = "<?xml version='1.0' encoding='UTF-8' standalone='yes'?>\n";

/// Studio written into every NFO
pub const STUDIO: &str = "YouTube";

/// Fields of an episode NFO
#[derive(Clone, Debug, Default)]
pub struct EpisodeNfo<'a> {
    /// Episode title
    pub title: &'a str,
    /// Season number text
    pub season: &'a str,
    /// Zero-padded episode number
    pub episode: &'a str,
    /// First description line
    pub plot: &'a str,
    /// `YYYY-MM-DD`, may be empty
    pub aired: &'a str,
    /// Show name
    pub show_title: &'a str,
}

/// Fields of a movie NFO
#[derive(Clone, Debug, Default)]
pub struct MovieNfo {
    /// Movie title
    pub title: String,
    /// Plot summary
    pub plot: String,
    /// Release year
    pub year: Option<String>,
    /// TMDb or video id
    pub id: Option<String>,
    /// Genre names
    pub genres: Vec<String>,
    /// Leading cast
    pub actors: Vec<String>,
}

fn element(out: &mut String, indent: &str, name: &str, value: &str) {
    let _ = writeln!(out, "{indent}<{name}>{}</{name}>", xml_escape(value));
}

/// `<episodedetails>` document
pub fn episode(nfo: &EpisodeNfo<'_>) -> String {
    let mut out = String::from(HEADER);
    out.push_str("<episodedetails>\n");
    element(&mut out, "  ", "title", nfo.title);
    element(&mut out, "  ", "season", nfo.season);
    element(&mut out, "  ", "episode", nfo.episode);
    element(&mut out, "  ", "plot", nfo.plot);
    element(&mut out, "  ", "aired", nfo.aired);
    element(&mut out, "  ", "studio", STUDIO);
    element(&mut out, "  ", "showtitle", nfo.show_title);
    out.push_str("</episodedetails>\n");
    out
}

/// `<season>` document
pub fn season(season_num: &str, show_name: &str) -> String {
    let mut out = String::from(HEADER);
    out.push_str("<season>\n");
    element(&mut out, "  ", "seasonnumber", season_num);
    element(&mut out, "  ", "title", &format!("Season {season_num}"));
    element(
        &mut out,
        "  ",
        "plot",
        &format!("Season {season_num} of {show_name}"),
    );
    out.push_str("</season>\n");
    out
}

/// `<tvshow>` document
pub fn tvshow(show_name: &str) -> String {
    let mut out = String::from(HEADER);
    out.push_str("<tvshow>\n");
    element(&mut out, "  ", "title", show_name);
    element(&mut out, "  ", "studio", STUDIO);
    out.push_str("</tvshow>\n");
    out
}

/// `<movie>` document
pub fn movie(nfo: &MovieNfo) -> String {
    let mut out = String::from(HEADER);
    out.push_str("<movie>\n");
    element(&mut out, "  ", "title", &nfo.title);
    element(&mut out, "  ", "plot", &nfo.plot);
    element(&mut out, "  ", "studio", STUDIO);
    if let Some(year) = nfo.year.as_deref().filter(|y| !y.is_empty()) {
        element(&mut out, "  ", "year", year);
    }
    if let Some(id) = nfo.id.as_deref().filter(|i| !i.is_empty()) {
        element(&mut out, "  ", "id", id);
    }
    for genre in &nfo.genres {
        element(&mut out, "  ", "genre", genre);
    }
    for actor in &nfo.actors {
        out.push_str("  <actor>\n");
        element(&mut out, "    ", "name", actor);
        out.push_str("  </actor>\n");
    }
    out.push_str("</movie>\n");
    out
}
