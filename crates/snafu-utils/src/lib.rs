//! Shared error plumbing: caller locations, a catch-all error for binaries and
//! a colored report printer.

use std::{error::Error, fmt, panic};

use ansi_term::{Color, WithFg};
use snafu::{GenerateImplicitData, Snafu};

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Location(&'static panic::Location<'static>);

impl Default for Location {
    #[track_caller]
    fn default() -> Self {
        Self(panic::Location::caller())
    }
}

impl GenerateImplicitData for Location {
    #[track_caller]
    fn generate() -> Self {
        Self::default()
    }
}

impl fmt::Debug for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.0, f)
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// Errors that know where they were raised.
///
/// [`Report`] cannot see into arbitrary error types, so errors that carry a
/// [`Location`] opt in by implementing this trait and are registered with
/// [`Report::locate`]. `GenericError` is always recognized.
pub trait HasLocation {
    fn location(&self) -> Location;
}

#[derive(Debug, Snafu)]
#[snafu(whatever, display("{message}"))]
pub struct GenericError {
    message: String,
    #[snafu(implicit)]
    location: Location,
    #[snafu(source(from(Box<dyn Error + Send + Sync>, Some)))]
    source: Option<Box<dyn Error + Send + Sync>>,
}

impl HasLocation for GenericError {
    fn location(&self) -> Location {
        self.location
    }
}

/// Looks up the location of an error in a chain.
type Locator = fn(&(dyn Error + 'static)) -> Option<Location>;

/// Recognizes a located error type inside an error chain.
pub trait Locate {
    fn locate(err: &(dyn Error + 'static)) -> Option<Location>;
}

impl<T> Locate for T
where
    T: HasLocation + Error + 'static,
{
    fn locate(err: &(dyn Error + 'static)) -> Option<Location> {
        err.downcast_ref::<T>().map(HasLocation::location)
    }
}

pub struct Report<E> {
    error: E,
    locators: Vec<Locator>,
}

impl<E> fmt::Debug for Report<E>
where
    E: Error + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl<E> fmt::Display for Report<E>
where
    E: Error + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Error: {}", WithFg::new(Color::Red, &self.error))?;
        if let Some(loc) = self.location_of(&self.error) {
            writeln!(f, "  at {}", WithFg::new(Color::DarkGray, loc))?;
        }
        let mut source = self.error.source();
        if source.is_some() {
            writeln!(f)?;
            writeln!(f, "Caused by:")?;
        }
        let mut index = 0;
        while let Some(s) = source {
            writeln!(f, "{index:4}: {}", WithFg::new(Color::Red, s))?;
            if let Some(loc) = self.location_of(s) {
                writeln!(f, "      at {}", WithFg::new(Color::DarkGray, loc))?;
            }
            source = s.source();
            index += 1;
        }
        Ok(())
    }
}

impl<E> Report<E> {
    pub fn new(error: E) -> Self {
        Self {
            error,
            locators: vec![<GenericError as Locate>::locate as Locator],
        }
    }

    /// Teaches the report to print locations of errors of type `T`.
    #[must_use]
    pub fn locate<T>(mut self) -> Self
    where
        T: Locate,
    {
        self.locators.push(T::locate);
        self
    }

    fn location_of(&self, err: &(dyn Error + 'static)) -> Option<Location> {
        self.locators.iter().find_map(|locate| locate(err))
    }
}
