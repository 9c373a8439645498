use anyhow::{Result, anyhow};
use filmdb_app::rest_api::movie::MovieJson;
use reqwest::Url;
use serde_json::json;
use tracing::info;

pub async fn create_movie(
    client: &reqwest::Client,
    base_url: &Url,
    title: &str,
    year: i32,
    runtime: i32,
    genres: &[&str],
) -> Result<MovieJson> {
    let payload = json!({
        "title": title,
        "year": year,
        "runtime": format!("{runtime} mins"),
        "genres": genres,
    });
    let api_url = base_url.join("v1/movies")?;

    let response = client.post(api_url).json(&payload).send().await?;
    info!("Response: {:#?}", response);
    if response.status().as_u16() != 201 {
        return Err(anyhow!("Unexpected status {}", response.status()));
    }

    let new_movie: MovieJson = response.json().await?;
    Ok(new_movie)
}
