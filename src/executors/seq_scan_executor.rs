use anyhow::Result;

use super::Executor;
use crate::catalog::schema::Schema;
use crate::storage::tuple_file::TupleReader;
use crate::tuple::Tuple;

pub struct SeqScanExecutor {
    reader: TupleReader,
    schema: Schema,
}

impl SeqScanExecutor {
    pub fn new(reader: TupleReader, schema: Schema) -> Self {
        Self { reader, schema }
    }
}

impl Executor for SeqScanExecutor {
    fn next(&mut self) -> Option<Result<Tuple>> {
        self.reader.next_tuple().transpose()
    }

    fn rewind(&mut self) -> Result<()> {
        self.reader.rewind();
        Ok(())
    }

    fn schema(&self) -> &Schema {
        &self.schema
    }
}
