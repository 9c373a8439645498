use axum::{
    extract::{rejection::QueryRejection, Query, State},
    response::IntoResponse,
    routing::{get, post},
    Json,
};
use filmdb_dal::movie::{CreateMovie, Movie, MovieRepository, UpdateMovie};
use filmdb_types::Runtime;
use garde::Validate as _;
use http::{header, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::json;
use time::OffsetDateTime;

use crate::{
    error::ApiResult,
    repository_from_request,
    rest_api::{Page, Paging, RecordId},
    state::AppState,
    validate::Garde,
};

repository_from_request!(MovieRepository);

fn is_zero<T: Default + PartialEq>(value: &T) -> bool {
    *value == T::default()
}

/// Movie as presented by the API
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MovieJson {
    #[serde(default, skip_serializing_if = "is_zero")]
    pub id: i64,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub title: String,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub year: i32,
    pub runtime: Runtime,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub genres: Vec<String>,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub version: i32,
}

impl From<Movie> for MovieJson {
    fn from(movie: Movie) -> Self {
        MovieJson {
            id: movie.id,
            created_at: movie.created_at,
            title: movie.title,
            year: movie.year,
            runtime: movie.runtime,
            genres: movie.genres,
            version: movie.version,
        }
    }
}

pub async fn create_movie(
    repository: MovieRepository,
    Garde(Json(payload)): Garde<Json<CreateMovie>>,
) -> ApiResult<impl IntoResponse> {
    let record = repository.create(payload).await?;
    let location = format!("/v1/movies/{}", record.id);

    Ok((
        StatusCode::CREATED,
        [(header::LOCATION, location)],
        Json(MovieJson::from(record)),
    ))
}

pub async fn list_movies(
    repository: MovieRepository,
    State(state): State<AppState>,
    paging: Result<Query<Paging>, QueryRejection>,
) -> ApiResult<impl IntoResponse> {
    let Query(paging) = paging?;
    paging.validate()?;
    let default_page_size: u32 = state.config().default_page_size;
    let page_size = paging.page_size(default_page_size);
    let listing_params = paging.into_listing_params(default_page_size)?;
    let batch = repository.list(listing_params).await?;
    let page = Page::from_batch(batch, page_size)?.map(MovieJson::from);
    Ok((StatusCode::OK, Json(page)))
}

pub async fn count_movies(repository: MovieRepository) -> ApiResult<impl IntoResponse> {
    let count = repository.count().await?;
    Ok((StatusCode::OK, Json(count)))
}

pub async fn show_movie(
    RecordId(id): RecordId,
    repository: MovieRepository,
) -> ApiResult<impl IntoResponse> {
    let record = repository.get(id).await?;

    Ok((StatusCode::OK, Json(MovieJson::from(record))))
}

pub async fn update_movie(
    RecordId(id): RecordId,
    repository: MovieRepository,
    Garde(Json(payload)): Garde<Json<UpdateMovie>>,
) -> ApiResult<impl IntoResponse> {
    let record = repository.update(id, payload).await?;

    Ok((StatusCode::OK, Json(MovieJson::from(record))))
}

pub async fn delete_movie(
    RecordId(id): RecordId,
    repository: MovieRepository,
) -> ApiResult<impl IntoResponse> {
    repository.delete(id).await?;

    Ok((
        StatusCode::OK,
        Json(json!({"message": "movie successfully deleted"})),
    ))
}

pub fn router() -> axum::Router<AppState> {
    axum::Router::new()
        .route("/", post(create_movie).get(list_movies))
        .route("/count", get(count_movies))
        .route(
            "/{id}",
            get(show_movie).put(update_movie).delete(delete_movie),
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use http::Request;
    use serde_json::Value;
    use tower::ServiceExt as _;
    use tracing_test::traced_test;

    async fn test_app() -> axum::Router {
        let pool = sqlx::sqlite::SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        filmdb_dal::migrate(&pool).await.unwrap();
        let state = AppState::new(Default::default(), pool);
        axum::Router::new()
            .nest("/v1/movies", router())
            .with_state(state)
    }

    async fn call(
        app: &axum::Router,
        method: &str,
        uri: &str,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), 1_000_000)
            .await
            .unwrap();
        let json = if body.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body).unwrap()
        };
        (status, json)
    }

    fn ju_dou() -> Value {
        json!({"title": "Ju Dou", "year": 1990, "runtime": "95 mins", "genres": ["drama", "romance"]})
    }

    #[test]
    fn test_movie_json_shape() {
        let movie = Movie {
            id: 0,
            created_at: OffsetDateTime::UNIX_EPOCH,
            title: String::new(),
            year: 0,
            runtime: Runtime::new(0),
            genres: vec![],
            version: 0,
        };
        let value = serde_json::to_value(MovieJson::from(movie)).unwrap();
        assert_eq!(
            value,
            json!({"created_at": "1970-01-01T00:00:00Z", "runtime": "0 mins"})
        );

        let movie = Movie {
            id: 1,
            created_at: OffsetDateTime::UNIX_EPOCH,
            title: "Ju Dou".to_string(),
            year: 1990,
            runtime: Runtime::new(95),
            genres: vec!["drama".to_string()],
            version: 3,
        };
        let value = serde_json::to_value(MovieJson::from(movie)).unwrap();
        assert_eq!(value["runtime"], "95 mins");
        assert_eq!(value["id"], 1);
        assert_eq!(value["version"], 3);
        assert_eq!(value["genres"], json!(["drama"]));
    }

    #[tokio::test]
    #[traced_test]
    async fn test_movie_crud() {
        let app = test_app().await;

        let (status, created) = call(&app, "POST", "/v1/movies", Some(ju_dou())).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(created["runtime"], "95 mins");
        assert_eq!(created["version"], 1);
        let id = created["id"].as_i64().unwrap();

        let (status, fetched) = call(&app, "GET", &format!("/v1/movies/{id}"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(fetched, created);

        let mut update = ju_dou();
        update["runtime"] = json!("101 mins");
        update["version"] = json!(1);
        let (status, updated) =
            call(&app, "PUT", &format!("/v1/movies/{id}"), Some(update.clone())).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(updated["runtime"], "101 mins");
        assert_eq!(updated["version"], 2);
        assert_eq!(updated["created_at"], created["created_at"]);

        let (status, _) = call(&app, "PUT", &format!("/v1/movies/{id}"), Some(update)).await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, page) = call(&app, "GET", "/v1/movies?sort=-year", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(page["total"], 1);
        assert_eq!(page["rows"][0]["id"], id);

        let (status, count) = call(&app, "GET", "/v1/movies/count", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(count, 1);

        let (status, body) = call(&app, "DELETE", &format!("/v1/movies/{id}"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "movie successfully deleted");

        let (status, _) = call(&app, "GET", &format!("/v1/movies/{id}"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _) = call(&app, "DELETE", &format!("/v1/movies/{id}"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_invalid_movie() {
        let app = test_app().await;

        let payload = json!({"title": "", "year": 0, "runtime": "0 mins", "genres": null});
        let (status, body) = call(&app, "POST", "/v1/movies", Some(payload)).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        let errors = body["error"].as_object().unwrap();
        assert_eq!(errors.len(), 4);

        let mut payload = ju_dou();
        payload["runtime"] = json!("95");
        let (status, body) = call(&app, "POST", "/v1/movies", Some(payload)).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(body["error"].as_str().unwrap().contains("invalid runtime data"));

        let (status, _) = call(&app, "GET", "/v1/movies/count", None).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_invalid_ids() {
        let app = test_app().await;
        for id in ["0", "-1", "abc", "999999"] {
            let (status, body) = call(&app, "GET", &format!("/v1/movies/{id}"), None).await;
            assert_eq!(status, StatusCode::NOT_FOUND, "id {id}");
            assert_eq!(body["error"], "the requested resource could not be found");
        }
        let (status, _) = call(&app, "PUT", "/v1/movies/abc", Some(ju_dou())).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_invalid_sort() {
        let app = test_app().await;
        let (status, _) = call(&app, "GET", "/v1/movies?sort=genres", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let (status, _) = call(&app, "GET", "/v1/movies?page_size=0", None).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        let (status, _) = call(&app, "GET", "/v1/movies?page=abc", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
