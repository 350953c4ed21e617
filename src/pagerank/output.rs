use crate::{error::Result, helpers::HelperArrays, types::Rank};
use log::info;
use std::{
    fs::File,
    io::{BufWriter, Write},
    path::Path,
};

/// Writes `<node> <rank>` for every valid node in ascending order.
pub fn write_ranks<W: Write>(writer: W, ranks: &[Rank], helpers: &HelperArrays) -> Result<()> {
    let mut writer = BufWriter::new(writer);
    for (node, (rank, _)) in ranks
        .iter()
        .zip(helpers.validity())
        .enumerate()
        .filter(|(_, (_, valid))| **valid)
    {
        writeln!(writer, "{} {}", node, rank)?;
    }
    writer.flush()?;
    Ok(())
}

pub fn write_ranks_file<P: AsRef<Path>>(
    path: P,
    ranks: &[Rank],
    helpers: &HelperArrays,
) -> Result<()> {
    info!("saving to {}...", path.as_ref().display());
    write_ranks(File::create(path)?, ranks, helpers)?;
    info!("saved");
    Ok(())
}
