//! Movie metadata stage: TMDb lookup, rename, poster and `movie.nfo`

use super::{StageContext, remove_quietly};
use crate::error::Result;
use crate::job::JobUpdate;
use crate::metadata::{MovieDetails, TmdbClient, VideoInfo, clean_title, find_sidecars, nfo};
use crate::types::Stage;
use crate::utils::{VIDEO_EXTENSIONS, clean_filename, list_files_with_extensions, sanitize_name};
use std::path::Path;

/// Cast members written into `movie.nfo`
const MAX_ACTORS: usize = 5;

/// Library file name for a movie: `Title (Year) [tag]`
pub(crate) fn movie_file_stem(title: &str, year: Option<&str>, tag: Option<&str>) -> String {
    let mut stem = title.trim().to_string();
    if let Some(year) = year.filter(|y| !y.is_empty()) {
        stem.push_str(&format!(" ({year})"));
    }
    if let Some(tag) = tag.filter(|t| !t.is_empty()) {
        stem.push_str(&format!(" [{tag}]"));
    }
    clean_filename(&sanitize_name(&stem))
}

/// TMDb details for the downloaded item; failures degrade to `None`
async fn lookup(
    ctx: &StageContext<'_>,
    tmdb: &TmdbClient,
    title: &str,
    year: Option<&str>,
) -> Option<MovieDetails> {
    ctx.job
        .message(format!("Searching TMDb for \"{title}\""));
    let found = match tmdb.search_movie(title, year).await {
        Ok(Some(found)) => found,
        Ok(None) => {
            ctx.job.message(format!("No TMDb match for \"{title}\""));
            return None;
        }
        Err(e) => {
            ctx.job.warn(format!("TMDb search failed: {e}"));
            return None;
        }
    };
    match tmdb.movie_details(found.id).await {
        Ok(details) => {
            ctx.job
                .message(format!("Matched TMDb movie {} ({})", details.title, details.id));
            Some(details)
        }
        Err(e) => {
            ctx.job.warn(format!("TMDb details lookup failed: {e}"));
            None
        }
    }
}

pub(crate) async fn run_movie_metadata_stage(
    ctx: &StageContext<'_>,
    folder: &Path,
    movie_name: &str,
    tmdb: Option<&TmdbClient>,
) -> Result<()> {
    ctx.job.update(
        JobUpdate::new()
            .stage(Stage::ProcessingMetadata)
            .stage_progress(0.0)
            .detailed("Processing movie metadata")
            .message("Processing movie metadata"),
    );

    let sidecars = find_sidecars(folder);
    let info = match sidecars.first() {
        Some(path) => Some(VideoInfo::load(path).await?),
        None => {
            ctx.job.warn("Warning: No JSON metadata file found for movie");
            None
        }
    };

    let search_title = info
        .as_ref()
        .map(|i| clean_title(&i.title))
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| movie_name.to_string());
    let video_year = info.as_ref().and_then(VideoInfo::year).map(str::to_string);

    let details = match tmdb {
        Some(tmdb) => lookup(ctx, tmdb, &search_title, video_year.as_deref()).await,
        None => None,
    };
    ctx.job.update(JobUpdate::new().stage_progress(40.0));

    let (document, stem) = match &details {
        Some(details) => {
            let tag = format!("tmdb{}", details.id);
            let stem = movie_file_stem(&details.title, details.year(), Some(&tag));
            let document = nfo::MovieNfo {
                title: details.title.clone(),
                plot: details.overview.clone(),
                year: details.year().map(str::to_string),
                id: Some(details.id.to_string()),
                genres: details.genres(),
                actors: details.actors(MAX_ACTORS),
            };
            (document, stem)
        }
        None => {
            let video_id = info.as_ref().map(|i| i.id.as_str()).filter(|id| !id.is_empty());
            let stem = movie_file_stem(movie_name, video_year.as_deref(), video_id);
            let document = nfo::MovieNfo {
                title: movie_name.to_string(),
                plot: info
                    .as_ref()
                    .and_then(|i| i.description.clone())
                    .unwrap_or_default(),
                year: video_year.clone(),
                id: video_id.map(str::to_string),
                genres: Vec::new(),
                actors: Vec::new(),
            };
            (document, stem)
        }
    };

    if let Some(video) = list_files_with_extensions(folder, VIDEO_EXTENSIONS).first() {
        let ext = video
            .extension()
            .map(|e| e.to_string_lossy().into_owned())
            .unwrap_or_else(|| "mp4".to_string());
        let renamed = folder.join(format!("{stem}.{ext}"));
        if &renamed != video {
            tokio::fs::rename(video, &renamed).await?;
            ctx.job.message(format!("Renamed movie file to {stem}.{ext}"));
        }
    } else {
        ctx.job.warn("No movie file found to rename");
    }

    if let (Some(tmdb), Some(poster_path)) = (
        tmdb,
        details.as_ref().and_then(|d| d.poster_path.as_deref()),
    ) {
        match tmdb
            .download_poster(poster_path, &folder.join("poster.jpg"))
            .await
        {
            Ok(()) => ctx.job.message("Downloaded movie poster"),
            Err(e) => ctx.job.warn(format!("Failed to download poster: {e}")),
        }
    }

    tokio::fs::write(folder.join("movie.nfo"), nfo::movie(&document)).await?;
    ctx.job.message("Created movie NFO file");

    for sidecar in &sidecars {
        remove_quietly(sidecar).await;
    }
    ctx.job.update(
        JobUpdate::new()
            .stage_progress(100.0)
            .detailed("Movie metadata processed"),
    );
    Ok(())
}
