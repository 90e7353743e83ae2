use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::error::ChainError;

use super::types::{
    BlockFile, BlockInFile, BlockRecord, ClaimRecord, ClaimRow, ClaimtrieEntry, TakeoverRecord,
};
use super::BlockIndexStore;

/// An in-memory block index answering the same queries as the SQLite
/// store over rows populated via the builder pattern.
#[derive(Debug, Default)]
pub struct MemoryBlockIndex {
    blocks: Vec<BlockRecord>,
    claims: Vec<ClaimRecord>,
    takeovers: Vec<TakeoverRecord>,
}

impl MemoryBlockIndex {
    pub fn builder() -> MemoryBlockIndexBuilder {
        MemoryBlockIndexBuilder {
            index: Self::default(),
        }
    }

    fn block_files(&self, file_number: Option<i64>, above_height: Option<i64>) -> Vec<BlockFile> {
        let filter = file_number.zip(above_height);
        let mut files: BTreeMap<i64, BlockFile> = BTreeMap::new();
        let stored = self.blocks.iter().filter(|block| block.is_stored()).filter(|block| {
            filter.map_or(true, |(file, height)| block.file == file && block.height > height)
        });
        for block in stored {
            let entry = files.entry(block.file).or_insert(BlockFile {
                file_number: block.file,
                blocks: 0,
                txs: 0,
                max_height: block.height,
            });
            entry.blocks += 1;
            entry.txs += block.tx_count;
            entry.max_height = entry.max_height.max(block.height);
        }
        files.into_values().collect()
    }

    fn blocks_in_file(&self, file: i64, above_height: i64) -> Vec<BlockInFile> {
        let mut rows: Vec<_> = self
            .blocks
            .iter()
            .filter(|block| block.file == file && block.height > above_height && block.is_stored())
            .map(|block| BlockInFile {
                data_offset: block.data_offset,
                height: block.height,
                block_hash: block.hash.clone(),
                txs: block.tx_count,
            })
            .collect();
        rows.sort_by_key(|row| row.data_offset);
        rows
    }

    /// Latest takeover per name among takeovers whose claim is known.
    /// Names whose latest takeover is at height zero are skipped.
    fn claimtrie(&self) -> Vec<ClaimtrieEntry> {
        let mut latest: BTreeMap<&[u8], (&TakeoverRecord, &ClaimRecord)> = BTreeMap::new();
        for takeover in &self.takeovers {
            let Some(claim) = self
                .claims
                .iter()
                .find(|claim| claim.claim_hash == takeover.claim_hash)
            else {
                continue;
            };
            latest
                .entry(takeover.name.as_slice())
                .and_modify(|current| {
                    if takeover.height > current.0.height {
                        *current = (takeover, claim);
                    }
                })
                .or_insert((takeover, claim));
        }
        latest
            .into_values()
            .filter(|(takeover, _)| takeover.height != 0)
            .map(|(takeover, claim)| ClaimtrieEntry {
                normalized: takeover.name.clone(),
                claim_hash: takeover.claim_hash.clone(),
                last_take_over_height: takeover.height,
                original_height: claim.original_height,
                update_height: claim.update_height,
                valid_height: claim.valid_height,
                activation_height: claim.activation_height,
                expiration_height: claim.expiration_height,
            })
            .collect()
    }

    fn claim_rows(&self) -> Vec<ClaimRow> {
        self.claims
            .iter()
            .map(|claim| ClaimRow {
                claim_hash: claim.claim_hash.clone(),
                tx_hash: claim.tx_hash.clone(),
                position: claim.position,
                amount: claim.amount,
                original_height: claim.original_height,
                update_height: claim.update_height,
                valid_height: claim.valid_height,
                activation_height: claim.activation_height,
                expiration_height: claim.expiration_height,
            })
            .collect()
    }
}

pub struct MemoryBlockIndexBuilder {
    index: MemoryBlockIndex,
}

impl MemoryBlockIndexBuilder {
    pub fn with_block(mut self, block: BlockRecord) -> Self {
        self.index.blocks.push(block);
        self
    }

    pub fn with_claim(mut self, claim: ClaimRecord) -> Self {
        self.index.claims.push(claim);
        self
    }

    pub fn with_takeover(mut self, takeover: TakeoverRecord) -> Self {
        self.index.takeovers.push(takeover);
        self
    }

    pub fn build(self) -> MemoryBlockIndex {
        self.index
    }
}

#[async_trait]
impl BlockIndexStore for MemoryBlockIndex {
    async fn get_block_files(
        &mut self,
        file_number: Option<i64>,
        above_height: Option<i64>,
    ) -> Result<Vec<BlockFile>, ChainError> {
        Ok(self.block_files(file_number, above_height))
    }

    async fn get_blocks_in_file(
        &mut self,
        file: i64,
        above_height: i64,
    ) -> Result<Vec<BlockInFile>, ChainError> {
        Ok(self.blocks_in_file(file, above_height))
    }

    async fn get_claimtrie(&mut self) -> Result<Vec<ClaimtrieEntry>, ChainError> {
        Ok(self.claimtrie())
    }

    async fn get_claims(&mut self) -> Result<Vec<ClaimRow>, ChainError> {
        Ok(self.claim_rows())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::test_fixtures::{block, claim, takeover};

    #[tokio::test]
    async fn block_files_skip_incomplete_blocks() {
        let mut index = MemoryBlockIndex::builder()
            .with_block(block(1, 10, 5, 3))
            .with_block(block(0, 20, 1, 2))
            .with_block(block(0, 10, 2, 4))
            .with_block(BlockRecord {
                status: 1,
                ..block(0, 30, 3, 7)
            })
            .build();
        let files = index.get_block_files(None, None).await.unwrap();
        assert_eq!(
            files,
            vec![
                BlockFile {
                    file_number: 0,
                    blocks: 2,
                    txs: 6,
                    max_height: 2,
                },
                BlockFile {
                    file_number: 1,
                    blocks: 1,
                    txs: 3,
                    max_height: 5,
                },
            ]
        );

        let filtered = index.get_block_files(Some(0), Some(1)).await.unwrap();
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].blocks, 1);
        assert_eq!(filtered[0].max_height, 2);

        // Both filters are needed for either to apply.
        assert_eq!(index.get_block_files(Some(0), None).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn blocks_in_file_are_ordered_by_offset() {
        let mut index = MemoryBlockIndex::builder()
            .with_block(block(0, 300, 3, 1))
            .with_block(block(0, 100, 1, 1))
            .with_block(block(0, 200, 2, 1))
            .with_block(block(1, 50, 4, 1))
            .build();
        let rows = index.get_blocks_in_file(0, -1).await.unwrap();
        let offsets: Vec<_> = rows.iter().map(|row| row.data_offset).collect();
        assert_eq!(offsets, vec![100, 200, 300]);

        let above = index.get_blocks_in_file(0, 1).await.unwrap();
        assert_eq!(above.len(), 2);
        assert_eq!(above[0].height, 2);
    }

    #[tokio::test]
    async fn claimtrie_keeps_latest_takeover_per_name() {
        let mut index = MemoryBlockIndex::builder()
            .with_claim(claim(0xA1, b"foo"))
            .with_claim(claim(0xA2, b"foo"))
            .with_claim(claim(0xB1, b"bar"))
            .with_takeover(takeover(b"foo", 200, 0xA2))
            .with_takeover(takeover(b"foo", 100, 0xA1))
            .with_takeover(takeover(b"bar", 0, 0xB1))
            .with_takeover(takeover(b"baz", 50, 0xFF))
            .build();
        let rows = index.get_claimtrie().await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].name(), "foo");
        assert_eq!(rows[0].last_take_over_height, 200);
        assert_eq!(rows[0].claim_hash, vec![0xA2; 20]);
    }

    #[tokio::test]
    async fn claims_list_every_claim() {
        let mut index = MemoryBlockIndex::builder()
            .with_claim(claim(0x01, b"a"))
            .with_claim(claim(0x02, b"b"))
            .build();
        let rows = index.get_claims().await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].claim_hash, vec![0x02; 20]);
    }
}
