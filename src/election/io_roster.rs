// Readers for the list of candidates.

use calamine::{open_workbook, DataType, Reader, Xlsx};

use crate::election::*;

pub fn read_roster(root: &Path, source: &CandidateSource) -> ElectionResult<Roster> {
    let p: PathBuf = root.join(&source.file_path);
    let p2 = p.as_path().display().to_string();
    info!("Attempting to read candidate file {:?}", p2);
    let candidates = match source.provider.as_str() {
        "json" => read_json_candidates(&p2)?,
        "xlsx" | "excel" => read_excel_candidates(&p2, source.worksheet_name.as_deref())?,
        x => whatever!("Provider not implemented {:?}", x),
    };
    debug!("read_roster: {} candidates", candidates.len());
    Roster::new(candidates).context(InvalidDataSnafu {})
}

fn read_json_candidates(path: &str) -> ElectionResult<Vec<Candidate>> {
    let contents = fs::read_to_string(path).context(OpeningJsonSnafu { path })?;
    serde_json::from_str(&contents).context(ParsingJsonSnafu { path })
}

// The positions of the known columns, found by name in the header row.
struct ExcelColumns {
    id: usize,
    name: usize,
    position: Option<usize>,
    activity: Option<usize>,
    bio: Option<usize>,
    photo: Option<usize>,
}

impl ExcelColumns {
    fn from_header(header: &[DataType], path: &str) -> ElectionResult<ExcelColumns> {
        let find = |name: &str| {
            header.iter().position(|cell| match cell {
                DataType::String(s) => s.trim().eq_ignore_ascii_case(name),
                _ => false,
            })
        };
        Ok(ExcelColumns {
            id: find("id").context(MissingColumnSnafu { name: "id", path })?,
            name: find("name").context(MissingColumnSnafu { name: "name", path })?,
            position: find("position"),
            activity: find("activity"),
            bio: find("bio"),
            photo: find("photo"),
        })
    }
}

fn read_excel_candidates(path: &str, worksheet: Option<&str>) -> ElectionResult<Vec<Candidate>> {
    let mut workbook: Xlsx<_> = open_workbook(path).context(OpeningExcelSnafu { path })?;
    let wrange = match worksheet {
        Some(name) => workbook
            .worksheet_range(name)
            .context(MissingWorksheetSnafu { name, path })?,
        None => workbook
            .worksheet_range_at(0)
            .context(EmptyExcelSnafu { path })?,
    }
    .context(OpeningExcelSnafu { path })?;

    let mut rows = wrange.rows();
    let header = rows.next().context(EmptyExcelSnafu { path })?;
    debug!("header: {:?}", header);
    let columns = ExcelColumns::from_header(header, path)?;

    let mut res: Vec<Candidate> = Vec::new();
    for (idx, row) in rows.enumerate() {
        // The header is the first line.
        let lineno = idx + 2;
        debug!("workbook: {:?}", row);
        if row.iter().all(|cell| matches!(cell, DataType::Empty)) {
            continue;
        }
        let id = match read_number(row.get(columns.id), lineno)? {
            Some(x) => x,
            None => whatever!("Line {}: missing candidate id", lineno),
        };
        let photo = read_text(columns.photo.and_then(|i| row.get(i)));
        res.push(Candidate {
            id: CandidateId(id),
            name: read_text(row.get(columns.name)),
            position: read_text(columns.position.and_then(|i| row.get(i))),
            bio: read_text(columns.bio.and_then(|i| row.get(i))),
            activity: read_number(columns.activity.and_then(|i| row.get(i)), lineno)?
                .unwrap_or(0),
            photo: if photo.is_empty() { None } else { Some(photo) },
            is_winner: false,
        });
    }
    Ok(res)
}

fn read_text(cell: Option<&DataType>) -> String {
    match cell {
        Some(DataType::String(s)) => s.trim().to_string(),
        Some(DataType::Int(i)) => i.to_string(),
        Some(DataType::Float(f)) => f.to_string(),
        _ => "".to_string(),
    }
}

fn read_number(cell: Option<&DataType>, lineno: usize) -> ElectionResult<Option<u32>> {
    let x: Option<u32> = match cell {
        None | Some(DataType::Empty) => return Ok(None),
        Some(DataType::Int(i)) => u32::try_from(*i).ok(),
        Some(DataType::Float(f)) if f.fract() == 0.0 && *f >= 0.0 && *f <= u32::MAX as f64 => {
            Some(*f as u32)
        }
        Some(DataType::String(s)) => s.trim().parse::<u32>().ok(),
        Some(_) => None,
    };
    match x {
        Some(n) => Ok(Some(n)),
        None => ExcelWrongCellTypeSnafu {
            lineno,
            content: format!("{:?}", cell),
        }
        .fail(),
    }
}
