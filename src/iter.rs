use serde::Serialize;

use crate::error::Result;
use crate::strategy::StrategySet;
use crate::translate::ValueTranslator;
use crate::writer::Writer;

/// Adapts an `Iterator<Item: Serialize>` into an `Iterator` of encoded CSV
/// lines, one [`Vec<u8>`] per input record (plus the header row as the
/// first item, when the writer's dialect calls for one).
///
/// # Example
///
/// ```
/// use csv_codec::WriterBuilder;
/// use serde::Serialize;
///
/// #[derive(Serialize)]
/// struct Row { foo: usize, bar: usize }
/// let rows = [Row { foo: 1, bar: 2 }, Row { foo: 3, bar: 4 }];
///
/// let writer = WriterBuilder::new().build();
/// let csv_iter = csv_codec::Iter::new(rows, writer, Default::default(), Default::default());
///
/// let mut buf = vec![];
/// for chunk in csv_iter {
///     buf.extend_from_slice(&chunk.unwrap());
/// }
/// assert_eq!(String::from_utf8(buf).unwrap(), "foo,bar\n1,2\n3,4");
/// ```
pub struct Iter<'a, I> {
    iter: I,
    writer: Writer,
    strategies: StrategySet,
    translator: ValueTranslator<'a>,
}

impl<'a, I: Iterator> Iter<'a, I> {
    pub fn new(iter: impl IntoIterator<IntoIter = I>, writer: Writer, strategies: StrategySet, translator: ValueTranslator<'a>) -> Self {
        Self { iter: iter.into_iter(), writer, strategies, translator }
    }
}

impl<'a, I: Iterator> Iterator for Iter<'a, I>
where
    I::Item: Serialize,
{
    type Item = Result<Vec<u8>>;

    fn next(&mut self) -> Option<Self::Item> {
        let record = self.iter.next()?;
        let mut buf = vec![];
        Some(self.writer.serialize(&mut buf, &record, &self.strategies, &self.translator).map(|_| buf))
    }
}

#[cfg(test)]
mod tests {
    use serde::Serialize;

    use super::Iter;
    use crate::dialect::{DialectBuilder, LineEnding};
    use crate::writer::WriterBuilder;

    #[derive(Serialize)]
    struct Row<'a> {
        city: &'a str,
        country: &'a str,
        #[serde(rename = "popcount")]
        population: u64,
    }

    const ROWS: [Row<'static>; 2] = [
        Row { city: "Boston", country: "United States", population: 4628910 },
        Row { city: "Concord", country: "United States", population: 42695 },
    ];

    #[test]
    fn serialize() {
        let writer = WriterBuilder::new().build();
        let i = Iter::new(ROWS, writer, Default::default(), Default::default());
        let buf: Vec<u8> = i.map(Result::unwrap).flatten().collect();
        let buf = String::from_utf8(buf).unwrap();
        assert_eq!(buf, "city,country,popcount\nBoston,United States,4628910\nConcord,United States,42695");
    }

    #[test]
    fn config() {
        let dialect = DialectBuilder::new().has_headers(false).delimiter(b';').line_ending(LineEnding::CRLF).build();
        let writer = WriterBuilder::new().dialect(dialect).build();
        let i = Iter::new(ROWS, writer, Default::default(), Default::default());
        let buf: Vec<u8> = i.map(Result::unwrap).flatten().collect();
        let buf = String::from_utf8(buf).unwrap();
        assert_eq!(buf, "Boston;United States;4628910\r\nConcord;United States;42695");
    }
}
