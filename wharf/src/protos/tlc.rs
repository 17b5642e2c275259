//! Container messages: the ordered file/dir/symlink listing shared by patches,
//! signatures and manifests.
//!
//! <https://github.com/itchio/lake/blob/d93a9d33bb65f76200e07d9606e1e251fd09cb07/tlc/tlc.proto>

#[derive(Clone, Debug, Default, PartialEq, Eq, prost::Message)]
pub struct File {
  #[prost(string, tag = "1")]
  pub path: String,
  #[prost(uint32, tag = "2")]
  pub mode: u32,
  #[prost(int64, tag = "3")]
  pub size: i64,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, prost::Message)]
pub struct Dir {
  #[prost(string, tag = "1")]
  pub path: String,
  #[prost(uint32, tag = "2")]
  pub mode: u32,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, prost::Message)]
pub struct Symlink {
  #[prost(string, tag = "1")]
  pub path: String,
  #[prost(uint32, tag = "2")]
  pub mode: u32,
  #[prost(string, tag = "3")]
  pub dest: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, prost::Message)]
pub struct Container {
  #[prost(int64, tag = "1")]
  pub size: i64,
  #[prost(message, repeated, tag = "2")]
  pub files: Vec<File>,
  #[prost(message, repeated, tag = "3")]
  pub dirs: Vec<Dir>,
  #[prost(message, repeated, tag = "4")]
  pub symlinks: Vec<Symlink>,
}
