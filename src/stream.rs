use pin_project::pin_project;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::Result;
use crate::header::HeaderResolver;
use crate::reader::Reader;
use crate::strategy::StrategySet;
use crate::translate::ValueTranslator;
use crate::writer::Writer;

#[pin_project]
/// Adapts a `futures::Stream<Item: Serialize>` into a stream of encoded CSV
/// lines, one [`Vec<u8>`] per input record.
pub struct Stream<'a, S> {
    #[pin]
    stream: S,

    writer: Writer,
    strategies: StrategySet,
    translator: ValueTranslator<'a>,
}

impl<'a, S> Stream<'a, S> {
    pub fn new(stream: S, writer: Writer, strategies: StrategySet, translator: ValueTranslator<'a>) -> Self {
        Self { stream, writer, strategies, translator }
    }
}

impl<'a, S: futures::Stream> futures::Stream for Stream<'a, S>
where
    S::Item: Serialize,
{
    type Item = Result<Vec<u8>>;

    fn poll_next(self: std::pin::Pin<&mut Self>, cx: &mut std::task::Context<'_>) -> std::task::Poll<Option<Self::Item>> {
        let p = self.project();
        let record = match p.stream.poll_next(cx) {
            std::task::Poll::Pending => return std::task::Poll::Pending,
            std::task::Poll::Ready(None) => return std::task::Poll::Ready(None),
            std::task::Poll::Ready(Some(record)) => record,
        };

        let mut buf = vec![];
        if let Err(e) = p.writer.serialize(&mut buf, &record, p.strategies, p.translator) {
            return std::task::Poll::Ready(Some(Err(e)));
        }
        std::task::Poll::Ready(Some(Ok(buf)))
    }
}

/// The decode-direction counterpart of [`Stream`]: an `async sequence` of
/// decoded records over an in-memory buffer (spec §6 `decode_stream`),
/// rather than a file path — opening and managing file handles is out of
/// this crate's scope. Each item is produced lazily by
/// [`Reader::decode_iter`]; nothing beyond the row currently in flight is
/// held in memory.
pub fn decode_stream<'b, T: DeserializeOwned>(
    reader: &Reader,
    buf: &'b [u8],
    resolver: &HeaderResolver,
    strategies: &'b StrategySet,
    translator: &'b ValueTranslator<'b>,
) -> Result<impl futures::Stream<Item = Result<T>> + 'b> {
    Ok(futures::stream::iter(reader.decode_iter(buf, resolver, strategies, translator)?))
}
