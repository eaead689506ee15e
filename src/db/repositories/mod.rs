pub mod exposures;
