const COMMANDS: &[&str] = &[
  "resolve_existing_entry",
  "resolve_duplicate",
  "classify",
  "copy_into_shared_storage",
  "describe_entry",
  "share_one",
  "share_many",
  "share_file",
  "share_files",
  "can_share",
];

fn main() {
  tauri_plugin::Builder::new(COMMANDS)
    .android_path("android")
    .ios_path("ios")
    .build();
}
