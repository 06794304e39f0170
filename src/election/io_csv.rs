// Export of the recorded ballots in CSV format.

use crate::election::*;

/// One line per ballot, with the names of the executive officers first.
pub fn votes_to_csv(ballot_box: &BallotBox) -> ElectionResult<String> {
    let mut buf: Vec<u8> = Vec::new();
    {
        let mut wtr = csv::Writer::from_writer(&mut buf);
        wtr.write_record(ballot_box.export_header())
            .context(CsvWriteSnafu {})?;
        let rows = ballot_box.export_rows();
        info!("votes_to_csv: exporting {} ballots", rows.len());
        for row in rows.iter() {
            wtr.write_record(row).context(CsvWriteSnafu {})?;
        }
        wtr.flush().context(CsvFlushSnafu {})?;
    }
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_box_has_only_the_header() {
        let roster = Roster::new(Vec::new()).unwrap();
        let bb = BallotBox::new(
            roster,
            SelectionLimits::new(4, 2).unwrap(),
            ElectionStatus::default(),
            VotesData::default(),
        );
        assert_eq!(
            votes_to_csv(&bb).unwrap(),
            "Voter ID,Executive 1,Executive 2,Council 1,Council 2\n"
        );
    }
}
