mod arg_parser;
mod client_cli;

use arg_parser::ArgParser;
use client_cli::{ClientCli, SynthesisFailed};
use protocol::Response;

use clap::Parser;
use std::{error, process};

#[tokio::main]
async fn main() -> Result<(), Box<dyn error::Error>> {
    let args = ArgParser::parse();
    let mut client = ClientCli::connect(&args.server).await?;

    match client.synthesize(&args.top_module, &args.files).await {
        Ok(bitstream) => {
            tokio::fs::write(&args.out, &bitstream).await?;
            println!("Wrote {} bytes to {}", bitstream.len(), args.out.display());
            Ok(())
        }
        Err(err) => {
            eprintln!("{}", err);
            if let Some(SynthesisFailed(Response::SynthesisError { log: Some(log), .. })) =
                err.downcast_ref::<SynthesisFailed>()
            {
                eprintln!("{}", log);
            }
            process::exit(1);
        }
    }
}
