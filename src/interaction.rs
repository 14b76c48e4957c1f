//! User interaction seam
//!
//! The archive never opens dialogs itself. Anything that needs a decision
//! from the user goes through [`Interaction`], which the GUI implements.

use std::path::PathBuf;

use crate::db::models::{NewSite, NewTelescope};
use crate::image::{AstroImage, SaveMethod};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confirmation {
    Accepted,
    Rejected,
}

pub trait Interaction {
    /// Ask whether `candidate` should be registered as a new site. The
    /// implementation may edit the candidate before accepting.
    fn confirm_new_site(&self, candidate: &mut NewSite) -> Confirmation;

    /// Ask whether `candidate` should be registered as a new telescope.
    fn confirm_new_telescope(&self, candidate: &mut NewTelescope) -> Confirmation;

    /// File or database for an image that has never been saved. `None` cancels.
    fn choose_save_destination(&self, image: &AstroImage) -> Option<SaveMethod>;

    /// Destination path for a file save. `None` cancels.
    fn choose_save_path(&self, image: &AstroImage) -> Option<PathBuf>;

    /// Comment attached to a new stored version. May be empty.
    fn prompt_version_comment(&self, image: &AstroImage) -> String;
}
