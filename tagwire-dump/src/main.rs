mod dump;

use tagwire::*;
use std::io::{self, Read};
use anyhow::{bail, Context, Result};
use structopt::StructOpt;
use std::str::from_utf8;

/// Print the raw fields of tagwire messages
#[derive(StructOpt)]
#[structopt(name = "twq", author = "Liv Fischer")]
struct Opt {
    /// read the input as protobuf instead of native tagwire
    #[structopt(short, long)]
    protobuf: bool,
    /// the input is a stream of length delimited messages
    #[structopt(short, long)]
    stream: bool,
    /// continue with the next stream element if one can not be dumped
    #[structopt(short, long, requires = "stream")]
    keep_going: bool,
    /// feed the stream in chunks of this many bytes
    #[structopt(short, long, default_value = "4096")]
    chunk: usize,
    /// the input is base64 encoded
    #[structopt(short, long)]
    base64: bool,
}

fn main() -> Result<()> {
    let opt = Opt::from_args();
    let mut buffer = Vec::new();
    io::stdin().read_to_end(&mut buffer).context("Failed to read stdin")?;
    if opt.base64 {
        let text = from_utf8(&buffer).context("base64 input is not utf-8")?;
        buffer = base64::decode(text.trim()).context("Invalid base64 input")?;
    }
    let format = if opt.protobuf { Format::Protobuf } else { Format::Native };
    if opt.stream {
        print_stream(&opt, &Decoder::with_format(format), &buffer)
    } else {
        print!("{}", dump::message(format, &buffer).context("Decoding error")?);
        Ok(())
    }
}

fn print_stream(opt: &Opt, decoder: &Decoder, input: &[u8]) -> Result<()> {
    if opt.chunk == 0 {
        bail!("chunk size must be positive");
    }
    let mut buffer = StreamingBuffer::new();
    let mut index = 0usize;
    for chunk in input.chunks(opt.chunk) {
        buffer.add_bytes(chunk);
        while let Some(element) = buffer
            .try_decode_one(|bytes: &[u8]| RawElement::split(decoder, bytes))
            .with_context(|| format!("Invalid frame of element {}", index))?
        {
            print_element(opt, decoder.format(), index, &element)?;
            index += 1;
        }
    }
    if buffer.has_more_bytes() {
        bail!("{} trailing bytes do not form a complete element", buffer.buffered_len());
    }
    Ok(())
}

fn print_element(opt: &Opt, format: Format, index: usize, element: &RawElement) -> Result<()> {
    if element.nil {
        println!("#{} nil", index);
        return Ok(());
    }
    println!("#{} ({} bytes)", index, element.message.len());
    match dump::message(format, &element.message) {
        Ok(text) => print!("{}", text),
        Err(e) if opt.keep_going => eprintln!("element {}: {}", index, e),
        Err(e) => return Err(e).with_context(|| format!("Decoding error in element {}", index)),
    }
    Ok(())
}
