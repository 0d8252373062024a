pub mod regressor;
