pub mod locator;
pub mod session;

// Re-export common types
pub use locator::{BrowserHandle, BrowserLauncher, ElementLocator, LocatorError, Target};
pub use session::{BrowserSession, WebDriverLauncher};
