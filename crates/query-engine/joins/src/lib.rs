pub mod joins;
