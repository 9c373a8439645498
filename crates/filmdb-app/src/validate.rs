use axum::extract::{FromRef, FromRequest, Request};
use garde::Validate;
use std::fmt::{Display, Formatter};
use std::ops::{Deref, DerefMut};

use crate::error::ApiError;
use crate::state::AppState;

/// Extractor wrapper, which validates extracted value.
///
/// Validation context is taken from the application state,
/// so rules depending on environment (like current date) can be used.
#[derive(Debug, Clone, Copy, Default)]
pub struct Garde<E>(pub E);

impl<E> Deref for Garde<E> {
    type Target = E;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<E> DerefMut for Garde<E> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

impl<E: Display> Display for Garde<E> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl<E> Garde<E> {
    /// Consumes the `Garde` and returns the validated data within.
    pub fn into_inner(self) -> E {
        self.0
    }
}

impl<Extractor, T> FromRequest<AppState> for Garde<Extractor>
where
    T: Validate,
    T::Context: FromRef<AppState>,
    Extractor: Deref<Target = T> + FromRequest<AppState>,
    ApiError: From<<Extractor as FromRequest<AppState>>::Rejection>,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &AppState) -> Result<Self, Self::Rejection> {
        let inner = Extractor::from_request(req, state).await?;
        let context = T::Context::from_ref(state);
        inner.deref().validate_with(&context)?;
        Ok(Garde(inner))
    }
}
