//! Circuit simulation datasets

// Imports
use {anyhow::Context, std::io};

/// Nominal (no variation) circuit simulation dataset.
///
/// Rows are kept in the order they were simulated in.
#[derive(PartialEq, Clone, Default, Debug)]
#[derive(serde::Serialize, serde::Deserialize)]
#[derive(bincode::Encode, bincode::Decode)]
pub struct RefDataset {
	/// Supply voltage (V)
	pub vdd: Vec<f64>,

	/// Frequency, the reciprocal of the simulated delay
	pub freq: Vec<f64>,

	/// Dynamic power
	pub dp: Vec<f64>,

	/// Static power
	pub sp: Vec<f64>,
}

impl RefDataset {
	/// Parses a dataset from tab-separated `vdd, delay, dp, sp` rows
	pub fn from_reader<R: io::Read>(reader: R) -> Result<Self, anyhow::Error> {
		let mut dataset = Self::default();
		for (row_idx, row) in self::tsv_reader(reader).deserialize::<(f64, f64, f64, f64)>().enumerate() {
			let (vdd, delay, dp, sp) = row.with_context(|| format!("Unable to parse row {row_idx}"))?;
			anyhow::ensure!(delay > 0.0, "Row {row_idx} has non-positive delay {delay}");

			dataset.vdd.push(vdd);
			dataset.freq.push(delay.recip());
			dataset.dp.push(dp);
			dataset.sp.push(sp);
		}
		dataset.validate()?;

		Ok(dataset)
	}

	/// Writes this dataset as tab-separated `vdd, delay, dp, sp` rows
	pub fn to_writer<W: io::Write>(&self, writer: W) -> Result<(), anyhow::Error> {
		let mut writer = self::tsv_writer(writer);
		for (&vdd, &freq, &dp, &sp) in itertools::multizip((&self.vdd, &self.freq, &self.dp, &self.sp)) {
			writer
				.serialize((vdd, freq.recip(), dp, sp))
				.context("Unable to write row")?;
		}
		writer.flush().context("Unable to flush writer")?;

		Ok(())
	}

	/// Returns the `(vdd, freq)` samples
	pub fn freq_samples(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
		self.vdd.iter().copied().zip(self.freq.iter().copied())
	}

	/// Returns the log-linear static power slope, in decades per volt.
	///
	/// Fitted through the first and last rows.
	pub fn sp_slope(&self) -> Result<f64, anyhow::Error> {
		let (v_first, v_last) = (self.vdd.first(), self.vdd.last());
		let (sp_first, sp_last) = (self.sp.first(), self.sp.last());
		let ((v_first, sp_first), (v_last, sp_last)) = v_first
			.zip(sp_first)
			.zip(v_last.zip(sp_last))
			.context("Dataset is empty")?;
		anyhow::ensure!(v_first != v_last, "Dataset needs at least 2 distinct voltages");
		anyhow::ensure!(
			*sp_first > 0.0 && *sp_last > 0.0,
			"Static power must be positive to fit a log-linear slope"
		);

		Ok((sp_last.log10() - sp_first.log10()) / (v_last - v_first))
	}

	/// Checks all columns have the same length
	fn validate(&self) -> Result<(), anyhow::Error> {
		let len = self.vdd.len();
		anyhow::ensure!(
			[self.freq.len(), self.dp.len(), self.sp.len()].iter().all(|&col_len| col_len == len),
			"Dataset columns have different lengths"
		);
		anyhow::ensure!(len >= 2, "Dataset needs at least 2 rows, found {len}");
		Ok(())
	}
}

/// Monte-Carlo (process and mismatch variation) circuit simulation dataset
#[derive(PartialEq, Clone, Default, Debug)]
#[derive(serde::Serialize, serde::Deserialize)]
#[derive(bincode::Encode, bincode::Decode)]
pub struct McDataset {
	/// Supply voltage (V)
	pub vdd: Vec<f64>,

	/// Frequency at 3 sigma
	pub freq_3sigma: Vec<f64>,

	/// Minimum frequency across all samples
	pub freq_min: Vec<f64>,

	/// Mean frequency
	pub freq_mean: Vec<f64>,

	/// Frequency at 2 sigma
	pub freq_2sigma: Vec<f64>,

	/// Frequency at 1 sigma
	pub freq_sigma: Vec<f64>,
}

impl McDataset {
	/// Parses a dataset from tab-separated `vdd, 3sigma, min, mean, 2sigma, sigma` rows
	pub fn from_reader<R: io::Read>(reader: R) -> Result<Self, anyhow::Error> {
		let mut dataset = Self::default();
		for (row_idx, row) in self::tsv_reader(reader)
			.deserialize::<(f64, f64, f64, f64, f64, f64)>()
			.enumerate()
		{
			let (vdd, freq_3sigma, freq_min, freq_mean, freq_2sigma, freq_sigma) =
				row.with_context(|| format!("Unable to parse row {row_idx}"))?;

			dataset.vdd.push(vdd);
			dataset.freq_3sigma.push(freq_3sigma);
			dataset.freq_min.push(freq_min);
			dataset.freq_mean.push(freq_mean);
			dataset.freq_2sigma.push(freq_2sigma);
			dataset.freq_sigma.push(freq_sigma);
		}
		anyhow::ensure!(dataset.vdd.len() >= 2, "Dataset needs at least 2 rows");

		Ok(dataset)
	}

	/// Writes this dataset as tab-separated rows
	pub fn to_writer<W: io::Write>(&self, writer: W) -> Result<(), anyhow::Error> {
		let mut writer = self::tsv_writer(writer);
		for row_idx in 0..self.vdd.len() {
			writer
				.serialize((
					self.vdd[row_idx],
					self.freq_3sigma[row_idx],
					self.freq_min[row_idx],
					self.freq_mean[row_idx],
					self.freq_2sigma[row_idx],
					self.freq_sigma[row_idx],
				))
				.context("Unable to write row")?;
		}
		writer.flush().context("Unable to flush writer")?;

		Ok(())
	}

	/// Returns the `(vdd, freq)` samples at sigma level `sigma`
	pub fn freq_samples(&self, sigma: SigmaLevel) -> impl Iterator<Item = (f64, f64)> + '_ {
		let freq = match sigma {
			SigmaLevel::One => &self.freq_sigma,
			SigmaLevel::Two => &self.freq_2sigma,
			SigmaLevel::Three => &self.freq_3sigma,
		};
		self.vdd.iter().copied().zip(freq.iter().copied())
	}
}

/// Sigma level of the variation-limited frequency
#[derive(PartialEq, Eq, Clone, Copy, Default, Debug)]
#[derive(serde::Serialize, serde::Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum SigmaLevel {
	One,
	Two,
	#[default]
	Three,
}

impl TryFrom<u8> for SigmaLevel {
	type Error = String;

	fn try_from(level: u8) -> Result<Self, Self::Error> {
		match level {
			1 => Ok(Self::One),
			2 => Ok(Self::Two),
			3 => Ok(Self::Three),
			_ => Err(format!("Sigma level must be 1, 2 or 3, found {level}")),
		}
	}
}

impl From<SigmaLevel> for u8 {
	fn from(level: SigmaLevel) -> Self {
		match level {
			SigmaLevel::One => 1,
			SigmaLevel::Two => 2,
			SigmaLevel::Three => 3,
		}
	}
}

/// Creates a tab-separated, header-less reader
fn tsv_reader<R: io::Read>(reader: R) -> csv::Reader<R> {
	csv::ReaderBuilder::new()
		.delimiter(b'\t')
		.has_headers(false)
		.trim(csv::Trim::All)
		.from_reader(reader)
}

/// Creates a tab-separated, header-less writer
fn tsv_writer<W: io::Write>(writer: W) -> csv::Writer<W> {
	csv::WriterBuilder::new()
		.delimiter(b'\t')
		.has_headers(false)
		.from_writer(writer)
}

#[cfg(test)]
mod tests {
	use {super::*, hetsim_util::ApproxEq};

	const ADDER: &str = "1.1\t0.5\t2.0\t100.0\n0.9\t1.0\t1.5\t10.0\n 0.7 \t2.0\t1.0\t1.0\n";

	#[test]
	fn parse_ref() {
		let dataset = RefDataset::from_reader(ADDER.as_bytes()).unwrap();
		assert_eq!(dataset.vdd, [1.1, 0.9, 0.7]);
		assert_eq!(dataset.freq, [2.0, 1.0, 0.5]);
		assert_eq!(dataset.sp, [100.0, 10.0, 1.0]);
		assert!(dataset.sp_slope().unwrap().approx_eq(2.0 / 0.4));
	}

	#[test]
	fn ref_written_rows_parse_back() {
		let dataset = RefDataset::from_reader(ADDER.as_bytes()).unwrap();
		let mut output = vec![];
		dataset.to_writer(&mut output).unwrap();
		assert_eq!(RefDataset::from_reader(&output[..]).unwrap(), dataset);
	}

	#[test]
	fn parse_rejects_malformed() {
		assert!(RefDataset::from_reader("1.0\t0.5\t2.0\n".as_bytes()).is_err());
		assert!(RefDataset::from_reader("1.0\t0.0\t1.0\t1.0\n0.5\t1.0\t1.0\t1.0\n".as_bytes()).is_err());
		assert!(RefDataset::from_reader("1.0\t0.5\t1.0\t1.0\n".as_bytes()).is_err());
	}

	#[test]
	fn mc_sigma_columns() {
		let data = "1.0\t3\t1\t9\t5\t7\n0.5\t0.3\t0.1\t0.9\t0.5\t0.7\n";
		let dataset = McDataset::from_reader(data.as_bytes()).unwrap();
		assert_eq!(dataset.freq_samples(SigmaLevel::Three).collect::<Vec<_>>(), [(1.0, 3.0), (0.5, 0.3)]);
		assert_eq!(dataset.freq_samples(SigmaLevel::Two).collect::<Vec<_>>(), [(1.0, 5.0), (0.5, 0.5)]);
		assert_eq!(dataset.freq_samples(SigmaLevel::One).collect::<Vec<_>>(), [(1.0, 7.0), (0.5, 0.7)]);
		assert_eq!(dataset.freq_min, [1.0, 0.1]);
	}

	#[test]
	fn sigma_level_from_int() {
		assert_eq!(SigmaLevel::try_from(2), Ok(SigmaLevel::Two));
		assert!(SigmaLevel::try_from(4).is_err());
		assert_eq!(SigmaLevel::default(), SigmaLevel::Three);
	}
}
