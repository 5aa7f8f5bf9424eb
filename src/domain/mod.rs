pub mod artwork;
pub mod track;
