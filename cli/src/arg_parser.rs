use clap::Parser;
use std::path::PathBuf;

/// Send HDL sources to a synthesis server and save the bitstream it returns
#[derive(Debug, Parser)]
pub struct ArgParser {
    /// The address of the server
    #[clap(short = 's', long = "server", env = "SYNTH_SERVER", default_value = "ws://127.0.0.1:2019")]
    pub server: String,

    /// Name of the top-level module
    #[clap(short = 't', long = "top")]
    pub top_module: String,

    /// Where to write the bitstream
    #[clap(short = 'o', long = "out", default_value = "out.bin.cbin")]
    pub out: PathBuf,

    /// HDL source files, uploaded under their file names
    #[clap(required = true, min_values = 1)]
    pub files: Vec<PathBuf>,
}
