pub mod assess;
pub mod check;
pub mod repair;
pub mod run;
